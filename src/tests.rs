use crate::ast::*;
use crate::blockspec::*;
use crate::error::{Error, ErrorKind, Errors, Position, Span};
use crate::lexer::{tokenize, TokenKind};
use crate::parser::{fragments, parse, Fragment, ParseOptions};
use crate::reflect::*;
use crate::scope::{Scope, ScopeMode};
use crate::tree::{DynamicTarget, Message};
use crate::types::TypeSet;
use crate::validate::validate_required;
use crate::walker::Walker;
use proptest::prelude::*;

// ── Shared fixtures ─────────────────────────────────────────────────

/// Embed fixture files at compile time.
const TYPES: &str = include_str!("../test-data/types.json");
const SPECS: &str = include_str!("../test-data/specs.json");
const SAMPLE: &str = include_str!("../test-data/sample.bcl");
const SAMPLE_EXPECTED: &str = include_str!("../test-data/sample.expected.json");
const PARSE_ERROR_FIXTURES: &str = include_str!("../test-data/fixtures/parse-errors.json");
const BIND_FIXTURES: &str = include_str!("../test-data/fixtures/bind.json");

fn types() -> TypeSet {
    TypeSet::from_json(TYPES).unwrap()
}

fn specs() -> SpecSet {
    SpecSet::from_json(SPECS).unwrap()
}

fn bind_file(types: &TypeSet, input: &str) -> Result<Message, Errors> {
    let mut target = DynamicTarget::new(types, "File").unwrap();
    let mut walker = Walker::new(specs());
    crate::parse_and_bind(input, &ParseOptions::default(), &mut walker, &mut target)?;
    Ok(target.into_message())
}

fn parse_ok(input: &str) -> File {
    let result = parse(input, &ParseOptions::default());
    assert!(result.errors.is_empty(), "unexpected errors: {}", result.errors);
    result.file
}

fn codes_and_positions(errors: &Errors) -> Vec<(String, usize, usize)> {
    errors
        .iter()
        .map(|e| {
            let start = e.span.map(|s| s.start).unwrap_or_default();
            (e.code().to_string(), start.line, start.column)
        })
        .collect()
}

fn expected_error(v: &serde_json::Value) -> (String, usize, usize) {
    (
        v["code"].as_str().unwrap().to_string(),
        v["line"].as_u64().unwrap() as usize,
        v["column"].as_u64().unwrap() as usize,
    )
}

#[test]
fn test_fixture_parse_errors() {
    let fixtures: Vec<serde_json::Value> = serde_json::from_str(PARSE_ERROR_FIXTURES).unwrap();

    for fixture in &fixtures {
        let name = fixture["name"].as_str().unwrap();
        let input = fixture["input"].as_str().unwrap();
        let expected: Vec<_> = fixture["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(expected_error)
            .collect();

        let result = parse(input, &ParseOptions::default());
        assert_eq!(
            codes_and_positions(&result.errors),
            expected,
            "Fixture '{}': {}",
            name,
            result.errors
        );

        // Fail-fast reports only the first of them.
        let fast = parse(
            input,
            &ParseOptions {
                fail_fast: true,
                ..ParseOptions::default()
            },
        );
        assert_eq!(fast.errors.len(), 1, "Fixture '{}' (fail fast)", name);
    }
}

#[test]
fn test_fixture_bind() {
    let types = types();
    let fixtures: Vec<serde_json::Value> = serde_json::from_str(BIND_FIXTURES).unwrap();

    for fixture in &fixtures {
        let name = fixture["name"].as_str().unwrap();
        let input = fixture["input"].as_str().unwrap();
        let result = bind_file(&types, input);

        if let Some(error) = fixture.get("error") {
            let errors = match result {
                Ok(m) => panic!("Fixture '{}': expected an error, bound {:?}", name, m),
                Err(errors) => errors,
            };
            assert_eq!(
                codes_and_positions(&errors),
                vec![expected_error(error)],
                "Fixture '{}': {}",
                name,
                errors
            );
            continue;
        }

        let message = match result {
            Ok(m) => m,
            Err(errors) => panic!("Fixture '{}': unexpected errors: {}", name, errors),
        };
        assert_eq!(
            crate::json::message_to_value(&message),
            fixture["expected"],
            "Fixture '{}'",
            name
        );
    }
}

#[test]
fn test_sample_document() {
    let types = types();
    let message = bind_file(&types, SAMPLE).unwrap();
    let expected: serde_json::Value = serde_json::from_str(SAMPLE_EXPECTED).unwrap();
    assert_eq!(crate::json::message_to_value(&message), expected);
    assert!(validate_required(&message, &types).is_empty());
}

// ── Lexer ───────────────────────────────────────────────────────────

fn kinds(input: &str) -> Vec<TokenKind> {
    let lexed = tokenize(input, true);
    assert!(lexed.ok(), "{:?}", lexed.errors);
    lexed.tokens.iter().map(|t| t.kind).collect()
}

#[test]
fn test_lex_statement_kinds() {
    use TokenKind::*;
    assert_eq!(
        kinds("field !id key:uuid {\n}"),
        vec![Ident, Bang, Ident, Ident, Colon, Ident, LBrace, Eol, RBrace, Eof]
    );
    assert_eq!(
        kinds("a.b += [1, 2.5, true, \"s\", /r/]"),
        vec![
            Ident, Dot, Ident, Append, LBracket, Int, Comma, Decimal, Comma, Bool, Comma, String,
            Comma, Regex, RBracket, Eof
        ]
    );
}

#[test]
fn test_lex_column_resets_after_newline() {
    let lexed = tokenize("a\n  b", true);
    let b = &lexed.tokens[2];
    assert_eq!(b.lit, "b");
    assert_eq!((b.span.start.line, b.span.start.column), (1, 2));
    assert_eq!(b.span.start.offset, 4);
}

#[test]
fn test_lex_string_escapes() {
    let lexed = tokenize(r#"a = "x\"y\\z""#, true);
    assert_eq!(lexed.tokens[2].kind, TokenKind::String);
    assert_eq!(lexed.tokens[2].lit, r#"x"y\z"#);

    let lexed = tokenize("a = \"one\\\ntwo\"", true);
    assert_eq!(lexed.tokens[2].lit, "one\ntwo");
}

#[test]
fn test_lex_regex_unescapes_doubled_slash() {
    let lexed = tokenize("p = /a//b/", true);
    assert_eq!(lexed.tokens[2].kind, TokenKind::Regex);
    assert_eq!(lexed.tokens[2].lit, "a/b");
}

#[test]
fn test_lex_description_trims_start() {
    let lexed = tokenize("  |    hello there\n", true);
    assert_eq!(lexed.tokens[0].kind, TokenKind::Description);
    assert_eq!(lexed.tokens[0].lit, "hello there");
}

#[test]
fn test_lex_negative_numbers() {
    let lexed = tokenize("a = -12\nb = -0.5", true);
    assert_eq!(lexed.tokens[2].kind, TokenKind::Int);
    assert_eq!(lexed.tokens[2].lit, "-12");
    assert_eq!(lexed.tokens[6].kind, TokenKind::Decimal);
    assert_eq!(lexed.tokens[6].lit, "-0.5");
}

#[test]
fn test_lex_unterminated_block_comment_is_tolerated() {
    let lexed = tokenize("a = 1 /* never closed", true);
    assert!(lexed.ok());
    let comment = &lexed.tokens[3];
    assert_eq!(comment.kind, TokenKind::BlockComment);
    assert_eq!(comment.lit, " never closed");
}

#[test]
fn test_lex_unicode_identifier_after_first_letter() {
    let lexed = tokenize("naïve = 1", true);
    assert!(lexed.ok());
    assert_eq!(lexed.tokens[0].lit, "naïve");
}

#[test]
fn test_lex_error_still_ends_with_eof() {
    let lexed = tokenize("a = 1\n@\nb = 2", false);
    assert_eq!(lexed.errors.len(), 1);
    assert!(matches!(
        lexed.errors[0].kind,
        ErrorKind::UnexpectedCharacter('@')
    ));
    let last = lexed.tokens.last().unwrap();
    assert_eq!(last.kind, TokenKind::Eof);
    assert_eq!(last.span.start.offset, "a = 1\n@\nb = 2".len());
}

// ── Parser ──────────────────────────────────────────────────────────

fn only_block(file: &File) -> &Block {
    match &file.body.statements[..] {
        [Statement::Block(b)] => b,
        other => panic!("expected one block, got {:?}", other),
    }
}

#[test]
fn test_parse_block_header() {
    let file = parse_ok("field !id key:uuid:v4 {\n  required = true\n}\n");
    let block = only_block(&file);
    assert_eq!(block.type_ref.to_string(), "field");
    assert!(block.open);

    assert_eq!(block.tags.len(), 2);
    assert_eq!(block.tags[0].mark, Mark::Bang);
    assert_eq!(block.tags[0].text(), "id");
    assert_eq!(block.tags[1].mark, Mark::None);

    let qualifiers: Vec<String> = block.qualifiers.iter().map(|q| q.text()).collect();
    assert_eq!(qualifiers, vec!["uuid", "v4"]);

    match &block.body.statements[..] {
        [Statement::Assignment(a)] => {
            assert_eq!(a.key.to_string(), "required");
            assert!(!a.append);
            assert!(matches!(&a.value, Value::Literal(l) if l.kind == LiteralKind::Bool));
        }
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_parse_literal_tags() {
    let file = parse_ok("field s enum \"pkg:Status\" ?maybe\n");
    let block = only_block(&file);
    assert!(matches!(&block.tags[2].kind, TagKind::Literal(l) if l.text == "pkg:Status"));
    assert_eq!(block.tags[3].mark, Mark::Question);
    assert!(!block.open);
}

#[test]
fn test_parse_header_description() {
    let file = parse_ok("option ACTIVE | The active state\n");
    let block = only_block(&file);
    assert!(!block.open);
    assert_eq!(block.description.as_ref().unwrap().text, "The active state");
}

#[test]
fn test_parse_description_lines_joined() {
    let file = parse_ok("| one\n|two\n\n| three\n");
    let texts: Vec<&str> = file
        .body
        .statements
        .iter()
        .map(|s| match s {
            Statement::Description(d) => d.text.as_str(),
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(texts, vec!["one\ntwo", "three"]);
}

#[test]
fn test_parse_nested_one_line() {
    let file = parse_ok("a { b { c = 1 } }");
    let a = only_block(&file);
    match &a.body.statements[..] {
        [Statement::Block(b)] => assert_eq!(b.body.statements.len(), 1),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_parse_comments_kept_aside() {
    let file = parse_ok("// top\na = 1 // trailing\n/* block */\n");
    assert_eq!(file.body.statements.len(), 1);
    let comments: Vec<(&str, bool)> = file
        .comments
        .iter()
        .map(|c| (c.text.as_str(), c.block))
        .collect();
    assert_eq!(
        comments,
        vec![(" top", false), (" trailing", false), (" block ", true)]
    );
}

#[test]
fn test_parse_array_values() {
    let file = parse_ok("a = [\n  1,\n  x.y,\n  \"s\",\n]\n");
    match &file.body.statements[..] {
        [Statement::Assignment(a)] => match &a.value {
            Value::Array { values, .. } => {
                assert_eq!(values.len(), 3);
                assert!(matches!(&values[1], Value::Reference(r) if r.to_string() == "x.y"));
            }
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_fragments_are_flat() {
    let (frags, errors) = fragments("a {\n  b = 1\n}\n// c\n", true);
    assert!(errors.is_empty());
    assert!(matches!(frags[0], Fragment::Block(ref b) if b.open));
    assert!(matches!(frags[1], Fragment::Assignment(_)));
    assert!(matches!(frags[2], Fragment::Close(_)));
    assert!(matches!(frags[3], Fragment::Comment(_)));
    assert_eq!(frags.len(), 4);
}

#[test]
fn test_unclosed_block_keeps_parsed_statements() {
    let result = parse("a {\n  b {\n    c = 1\n", &ParseOptions::default());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors.iter().next().unwrap().code(), "unclosed-block");
    let a = only_block(&result.file);
    match &a.body.statements[..] {
        [Statement::Block(b)] => assert_eq!(b.body.statements.len(), 1),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_errors_carry_filename_and_render() {
    let options = ParseOptions {
        fail_fast: false,
        filename: Some("x.bcl".to_string()),
    };
    let result = parse("a = 1\nb = = 2\n", &options);
    let err = result.errors.iter().next().unwrap();
    assert_eq!(err.filename.as_deref(), Some("x.bcl"));
    assert!(err.to_string().starts_with("x.bcl:2:5: unexpected '='"));

    let rendered = result.errors.render("a = 1\nb = = 2\n", 1);
    assert!(rendered.contains("2 | b = = 2"), "{}", rendered);
    assert!(rendered.contains("  |     ^"), "{}", rendered);
    assert!(rendered.contains("1 | a = 1"), "{}", rendered);
}

#[test]
fn test_render_error_at_end_of_input() {
    let source = "a = [1,\n";
    let at = Position {
        line: 1,
        column: 0,
        offset: source.len(),
    };
    let err = Error::at(ErrorKind::UnexpectedEof, Span::point(at));
    let rendered = err.render(source, 0);
    assert!(rendered.contains("2 | \n"), "{}", rendered);
    assert!(rendered.contains("  | ^"), "{}", rendered);
}

#[test]
fn test_errors_json() {
    let result = parse("}", &ParseOptions::default());
    let json: serde_json::Value =
        serde_json::from_str(&crate::json::errors_to_json(&result.errors)).unwrap();
    assert_eq!(json[0]["code"], "unexpected-close-block");
    assert_eq!(json[0]["begin"]["column"], 0);
}

// ── Block specs ─────────────────────────────────────────────────────

fn parts(s: &str) -> Vec<String> {
    s.split('.').map(str::to_string).collect()
}

fn path(s: &str) -> FieldPath {
    parts(s)
}

#[test]
fn test_scalar_split_left_to_right() {
    let split = ScalarSplit {
        required: vec![path("a")],
        optional: vec![path("b")],
        remainder: Some(path("rest")),
        ..ScalarSplit::default()
    };
    assert_eq!(
        split.assign(parts("x.y.z.w")).unwrap(),
        vec![
            (path("a"), "x".to_string()),
            (path("b"), "y".to_string()),
            (path("rest"), "z.w".to_string()),
        ]
    );
    assert_eq!(
        split.assign(parts("x")).unwrap(),
        vec![(path("a"), "x".to_string())]
    );
}

#[test]
fn test_scalar_split_right_to_left() {
    let split = ScalarSplit {
        right_to_left: true,
        required: vec![path("schema")],
        remainder: Some(path("package")),
        ..ScalarSplit::default()
    };
    assert_eq!(
        split.assign(parts("a.b.c")).unwrap(),
        vec![
            (path("schema"), "c".to_string()),
            (path("package"), "a.b".to_string()),
        ]
    );
}

#[test]
fn test_scalar_split_arity_errors() {
    let split = ScalarSplit {
        required: vec![path("a"), path("b")],
        ..ScalarSplit::default()
    };
    assert!(matches!(
        split.assign(parts("x")),
        Err(ErrorKind::ScalarSplit(_))
    ));
    assert!(matches!(
        split.assign(parts("x.y.z")),
        Err(ErrorKind::ScalarSplit(_))
    ));
}

#[test]
fn test_snake_case() {
    assert_eq!(snake_case("EnumOption"), "enum_option");
    assert_eq!(snake_case("KeyFormatUUID"), "key_format_uuid");
    assert_eq!(snake_case("object"), "object");
}

#[test]
fn test_derived_spec() {
    let types = types();
    let target = DynamicTarget::new(&types, "Enum").unwrap();
    let mut cache = SpecCache::new(specs());
    let spec = cache.block_spec(&target, &Location::root()).unwrap();

    assert_eq!(spec.name, Some(Tag::field(&["name"])));
    assert_eq!(spec.description, Some(vec!["description".to_string()]));

    let option = &spec.children["option"];
    assert_eq!(option.path, vec!["options".to_string()]);
    assert!(option.is_container && option.is_collection && !option.is_scalar);

    let value = &spec.children["value"];
    assert_eq!(value.path, vec!["options".to_string()]);
    assert!(value.is_container && value.is_collection);

    let prefix = &spec.children["prefix"];
    assert!(prefix.is_scalar && !prefix.is_collection);

    // Cached by schema set and name.
    let cached = cache.cached(target.schema_set(), "Enum").unwrap();
    assert!(std::rc::Rc::ptr_eq(&spec, &cached));
}

#[test]
fn test_only_defined_skips_derivation() {
    let types = types();
    let target = DynamicTarget::new(&types, "Enum").unwrap();
    let only = BlockSpec {
        only_defined: true,
        children: [(
            "entry".to_string(),
            ChildSpec {
                path: vec!["options".to_string()],
                ..ChildSpec::default()
            },
        )]
        .into_iter()
        .collect(),
        ..BlockSpec::default()
    };
    let mut cache = SpecCache::new(SpecSet::new().with("Enum", only));
    let spec = cache.block_spec(&target, &Location::root()).unwrap();
    assert_eq!(spec.children.keys().collect::<Vec<_>>(), vec!["entry"]);
    assert!(spec.name.is_none());
}

#[test]
fn test_spec_rejects_bad_field_names() {
    let err = SpecSet::from_json(r#"{"Enum": {"description": ["bad-name"]}}"#).unwrap_err();
    assert!(err.to_string().contains("bad-name"), "{}", err);

    let err = SpecSet::from_json(r#"{"Enum": {"name": {"field": ["name"], "block": true}}}"#)
        .unwrap_err();
    assert!(err.to_string().contains("name tag"), "{}", err);
}

#[test]
fn test_spec_child_must_exist() {
    let types = types();
    let mut target = DynamicTarget::new(&types, "File").unwrap();
    let bad = BlockSpec {
        children: [(
            "thing".to_string(),
            ChildSpec {
                path: vec!["nope".to_string()],
                ..ChildSpec::default()
            },
        )]
        .into_iter()
        .collect(),
        ..BlockSpec::default()
    };
    let mut walker = Walker::new(SpecSet::new().with("File", bad));
    let file = parse_ok("package = \"x\"");
    let err = walker.bind(&mut target, &file.body).unwrap_err();
    assert_eq!(err.code(), "invalid-spec");
}

#[test]
fn test_type_set_reference_check() {
    let err = TypeSet::from_json(
        r#"{"A": {"kind": "object", "properties": [{"name": "b", "type": {"object": "Missing"}}]}}"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("Missing"), "{}", err);

    let err = TypeSet::from_json(
        r#"{
            "A": {"kind": "object", "properties": [{"name": "b", "type": {"oneof": "B"}}]},
            "B": {"kind": "object"}
        }"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("A.b"), "{}", err);
}

// ── Scope ───────────────────────────────────────────────────────────

#[test]
fn test_merged_scope_prefers_inner_container() {
    let types = types();
    let mut target = DynamicTarget::new(&types, "File").unwrap();
    let mut cache = SpecCache::new(specs());
    let root = Scope::root(&target, &mut cache).unwrap();

    // File and Use both declare `package`.
    let merged = root
        .child_block("use", ScopeMode::Merge, &mut target, &mut cache)
        .unwrap();
    assert_eq!(merged.current().schema_name, "Use");
    let package = merged.field("package", &mut target).unwrap();
    assert_eq!(package.field.container, Location::root().child("uses").index(0));

    // Outer names stay visible after a merge, not after a reset.
    assert!(merged.field("tags", &mut target).unwrap().collection);
    let reset = root
        .child_block("use", ScopeMode::Reset, &mut target, &mut cache)
        .unwrap();
    let err = reset.field("tags", &mut target).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NameNotFound { .. }), "{}", err);
}

#[test]
fn test_map_entries_are_child_blocks() {
    let types = types();
    let mut target = DynamicTarget::new(&types, "File").unwrap();
    let mut cache = SpecCache::new(specs());
    let root = Scope::root(&target, &mut cache).unwrap();

    let map = root
        .child_block("annotations", ScopeMode::Merge, &mut target, &mut cache)
        .unwrap();
    let entry = map
        .child_block("owner", ScopeMode::Merge, &mut target, &mut cache)
        .unwrap();
    assert_eq!(entry.current().schema_name, "Annotation");
    assert_eq!(
        entry.current().location,
        Location::root().child("annotations").child("owner")
    );
    assert_eq!(entry.current().path, vec!["annotations", "owner"]);
}

// ── Dynamic target ──────────────────────────────────────────────────

#[test]
fn test_oneof_option_clears_siblings() {
    let types = types();
    let mut target = DynamicTarget::new(&types, "Field").unwrap();
    let root = Location::root();
    target.field(&root, "string").unwrap();
    target.field(&root, "bool").unwrap();
    let fields: Vec<&String> = target.message().fields.keys().collect();
    assert_eq!(fields, vec!["bool"]);
}

#[test]
fn test_scalar_coercion() {
    let types = types();
    let mut target = DynamicTarget::new(&types, "FloatField").unwrap();
    let field = match target.field(&Location::root(), "minimum").unwrap() {
        FieldHandle::Scalar(f) => f,
        other => panic!("unexpected {:?}", other),
    };
    target.set_scalar(&field, ScalarValue::Int(2)).unwrap();
    assert_eq!(
        target.message().get("minimum"),
        Some(&crate::tree::Value::Scalar(ScalarValue::Float(2.0)))
    );

    let err = target
        .set_scalar(&field, ScalarValue::Bool(true))
        .unwrap_err();
    assert!(matches!(err, ReflectError::TypeMismatch { .. }));
}

#[test]
fn test_unknown_root_schema() {
    let types = types();
    assert!(DynamicTarget::new(&types, "IntegerFormat").is_err());
    assert!(DynamicTarget::new(&types, "Nope").is_err());
}

#[test]
fn test_message_lookup() {
    let types = types();
    let message = bind_file(&types, SAMPLE).unwrap();
    assert_eq!(
        message
            .lookup("objects[0].properties[3].schema.integer.format")
            .and_then(|v| v.as_str()),
        Some("INT32")
    );
    assert_eq!(
        message
            .lookup("enums[0].options[0].number")
            .and_then(|v| v.as_int()),
        Some(1)
    );
    assert!(message.lookup("objects[5]").is_none());
}

// ── Binding ─────────────────────────────────────────────────────────

#[test]
fn test_bind_error_context() {
    let types = types();
    let errors = bind_file(&types, "object A {\n  field n integer:INT16\n}").unwrap_err();
    let err = errors.iter().next().unwrap();
    assert_eq!(err.context, vec!["object(A)", "field(n)"]);
    assert!(err.to_string().starts_with("2:19: object(A).field(n): "), "{}", err);
}

#[test]
fn test_name_not_found_lists_candidates() {
    let types = types();
    let errors = bind_file(&types, "objct Foo").unwrap_err();
    match &errors.iter().next().unwrap().kind {
        ErrorKind::NameNotFound { name, available } => {
            assert_eq!(name, "objct");
            assert!(available.contains(&"object".to_string()));
            assert!(available.contains(&"labels".to_string()));
            assert!(!available.contains(&"package".to_string()));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_parse_errors_stop_binding() {
    let types = types();
    let errors = bind_file(&types, "package = \"a\"\nobject A {").unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.iter().next().unwrap().code(), "unclosed-block");
}

#[test]
fn test_walker_reused_across_documents() {
    let types = types();
    let mut walker = Walker::new(specs());
    let mut first = DynamicTarget::new(&types, "File").unwrap();
    let mut second = DynamicTarget::new(&types, "File").unwrap();
    let options = ParseOptions::default();

    crate::parse_and_bind("object A", &options, &mut walker, &mut first).unwrap();
    crate::parse_and_bind("object B\nobject C", &options, &mut walker, &mut second).unwrap();

    assert!(walker
        .spec_cache()
        .cached(first.schema_set(), "Object")
        .is_some());
    assert_eq!(
        second
            .message()
            .lookup("objects[1].name")
            .and_then(|v| v.as_str()),
        Some("C")
    );
    assert_eq!(first.message().lookup("objects").and_then(|v| v.as_list()).map(|l| l.len()), Some(1));
}

#[test]
fn test_walker_keeps_type_sets_apart() {
    let titled = TypeSet::from_json(
        r#"{"Doc": {"kind": "object", "properties": [{"name": "title", "type": "string"}]}}"#,
    )
    .unwrap();
    let subjected = TypeSet::from_json(
        r#"{"Doc": {"kind": "object", "properties": [{"name": "subject", "type": "string"}]}}"#,
    )
    .unwrap();
    let mut walker = Walker::new(SpecSet::new());
    let mut first = DynamicTarget::new(&titled, "Doc").unwrap();
    let mut second = DynamicTarget::new(&subjected, "Doc").unwrap();
    assert_ne!(first.schema_set(), second.schema_set());

    let options = ParseOptions::default();
    crate::parse_and_bind("title = a", &options, &mut walker, &mut first).unwrap();
    crate::parse_and_bind("subject = b", &options, &mut walker, &mut second).unwrap();
    assert_eq!(
        second.message().lookup("subject").and_then(|v| v.as_str()),
        Some("b")
    );
}

#[test]
fn test_bind_error_filename() {
    let types = types();
    let mut target = DynamicTarget::new(&types, "File").unwrap();
    let mut walker = Walker::new(specs());
    let options = ParseOptions {
        filename: Some("defs.bcl".to_string()),
        ..ParseOptions::default()
    };
    let errors = crate::parse_and_bind("widget X", &options, &mut walker, &mut target).unwrap_err();
    assert!(errors.to_string().starts_with("defs.bcl:1:1: "), "{}", errors);
}

// ── Validation ──────────────────────────────────────────────────────

#[test]
fn test_validate_required() {
    let types = types();
    let message = bind_file(&types, "object A {\n  field !b string\n}\nuse x.Y").unwrap();
    let errors = validate_required(&message, &types);
    let paths: Vec<String> = errors.iter().map(|e| e.path.join(".")).collect();
    assert_eq!(paths, vec!["package"]);
    assert!(errors.iter().all(|e| e.code == "missing-required"));

    let err = Error::from(errors[0].clone());
    assert_eq!(err.code(), "missing-required");
    assert!(err.to_string().contains("\"package\""), "{}", err);

    let message = bind_file(&types, "package = p\nobject A {\n  properties.name = b\n}").unwrap();
    let errors = validate_required(&message, &types);
    let paths: Vec<String> = errors.iter().map(|e| e.path.join(".")).collect();
    assert_eq!(paths, vec!["objects[0].properties[0].schema"]);
}

#[test]
fn test_validate_oneof_exempt() {
    let types = types();
    let message =
        bind_file(&types, "package = p\nobject A {\n  field b key:uuid\n}").unwrap();
    assert!(validate_required(&message, &types).is_empty());
}

// ── Properties ──────────────────────────────────────────────────────

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}".prop_filter("keywords", |s| s != "true" && s != "false")
}

proptest! {
    #[test]
    fn prop_assignment_round_trip(key in ident(), value in "[a-zA-Z0-9 _.:]{0,16}") {
        let src = format!("{} = \"{}\"\n", key, value);
        let file = parse(&src, &ParseOptions::default()).into_result().unwrap();
        match &file.body.statements[..] {
            [Statement::Assignment(a)] => {
                prop_assert_eq!(&a.key.to_string(), &key);
                match &a.value {
                    Value::Literal(l) => {
                        prop_assert_eq!(l.kind, LiteralKind::String);
                        prop_assert_eq!(&l.text, &value);
                    }
                    other => prop_assert!(false, "unexpected value {:?}", other),
                }
            }
            other => prop_assert!(false, "unexpected statements {:?}", other),
        }
    }

    #[test]
    fn prop_unbalanced_braces(lines in proptest::collection::vec(0u8..3, 0..24)) {
        let mut src = String::new();
        let mut depth = 0usize;
        let mut stray = 0usize;
        for line in &lines {
            match line {
                0 => { src.push_str("a {\n"); depth += 1; }
                1 => {
                    src.push_str("}\n");
                    if depth == 0 { stray += 1 } else { depth -= 1 }
                }
                _ => src.push_str("b = 1\n"),
            }
        }
        let result = parse(&src, &ParseOptions::default());
        let codes: Vec<&str> = result.errors.iter().map(|e| e.code()).collect();
        let closes = codes.iter().filter(|c| **c == "unexpected-close-block").count();
        let unclosed = codes.iter().filter(|c| **c == "unclosed-block").count();
        prop_assert_eq!(closes, stray);
        prop_assert_eq!(unclosed, usize::from(depth > 0));
        prop_assert_eq!(codes.len(), closes + unclosed);
    }

    #[test]
    fn prop_token_spans_ordered(src in "[a-z0-9 ={}\\[\\].,:!?\n\"|/+-]{0,40}") {
        let lexed = tokenize(&src, false);
        let mut prev = 0usize;
        for token in &lexed.tokens {
            prop_assert!(token.span.start.offset <= token.span.end.offset);
            prop_assert!(token.span.end.offset <= src.len());
            prop_assert!(token.span.start.offset >= prev);
            prev = token.span.start.offset;
        }
        prop_assert_eq!(lexed.tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    }

    #[test]
    fn prop_scalar_split_orders(segments in proptest::collection::vec(ident(), 2..6), rtl: bool) {
        let split = ScalarSplit {
            right_to_left: rtl,
            required: vec![path("first")],
            optional: vec![path("second")],
            remainder: Some(path("rest")),
            ..ScalarSplit::default()
        };
        let out = split.assign(segments.clone()).unwrap();
        let n = segments.len();
        let (first, second, rest) = if rtl {
            (&segments[n - 1], &segments[n - 2], segments[..n - 2].join("."))
        } else {
            (&segments[0], &segments[1], segments[2..].join("."))
        };
        prop_assert_eq!(&out[0], &(path("first"), first.clone()));
        prop_assert_eq!(&out[1], &(path("second"), second.clone()));
        if n > 2 {
            prop_assert_eq!(&out[2], &(path("rest"), rest));
        } else {
            prop_assert_eq!(out.len(), 2);
        }
    }
}
