//! End-to-end tests for the layout engine: multi-context sessions, deferred
//! resolution, and the standalone evaluator.

use open_mainframe_layout::{
    decode_storage_operand, evaluate, evaluate_operand, tokenize, DataType, Directive, ErrorKind,
    LayoutConfig, LayoutFile, LayoutSession, Lookups, MapSymbols, NoSymbols, NormalizedRecord,
    StorageOperand, Value,
};

fn rec(label: &str, command: Directive, operand: &str) -> NormalizedRecord {
    NormalizedRecord::labeled(label, command, operand)
}

fn unlabeled(command: Directive, operand: &str) -> NormalizedRecord {
    NormalizedRecord::new(None, command, operand)
}

// ---------------------------------------------------------------------------
//  Concrete scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_fullword_then_halfword() {
    let mut session = LayoutSession::new();
    let layout = session.resolve(
        "CTX",
        &[rec("A", Directive::Ds, "F"), rec("B", Directive::Ds, "H")],
    );

    let a = layout.lookup("A").unwrap();
    let b = layout.lookup("B").unwrap();
    assert_eq!((a.displacement, a.length), (0, 4));
    assert_eq!((b.displacement, b.length), (4, 2));
    assert_eq!(layout.size, 6);
}

#[test]
fn test_equ_forward_reference_resolved_in_retry() {
    let mut session = LayoutSession::new();
    let layout = session.resolve(
        "CTX",
        &[
            rec("PAD", Directive::Ds, "D"),
            rec("C", Directive::Equ, "D+1"),
            rec("D", Directive::Ds, "F"),
        ],
    );

    let d = layout.lookup("D").unwrap();
    assert_eq!((d.displacement, d.length), (8, 4));
    let c = layout.lookup("C").unwrap();
    assert_eq!((c.displacement, c.length), (9, 1));
    assert!(layout.diagnostics.is_empty());
}

#[test]
fn test_hex_literal_operand() {
    let (value, tag) = evaluate_operand("X'1F'", &Lookups::new(&NoSymbols, 0)).unwrap();
    assert_eq!(value, Value::Int(31));
    assert_eq!(tag, Some(DataType::X));
}

#[test]
fn test_char_literal_operand_is_not_converted() {
    let (value, tag) = evaluate_operand("C'AB'", &Lookups::new(&NoSymbols, 0)).unwrap();
    assert_eq!(value, Value::Char("AB".to_string()));
    assert_eq!(tag, Some(DataType::C));
}

#[test]
fn test_length_attribute_in_storage_operand() {
    let symbols = MapSymbols::new().with("A", 0, 4);
    let op = decode_storage_operand("CL(L'A)", &Lookups::new(&symbols, 0)).unwrap();
    assert_eq!(
        op,
        StorageOperand {
            duplication: 1,
            data_type: DataType::C,
            length: 4,
        }
    );
}

#[test]
fn test_malformed_duplication_is_terminal() {
    let mut session = LayoutSession::new();
    let layout = session.resolve(
        "CTX",
        &[
            rec("BAD", Directive::Ds, "3-1F"),
            rec("LATER", Directive::Ds, "F"),
        ],
    );

    assert_eq!(layout.diagnostics.len(), 1);
    let diag = &layout.diagnostics[0];
    assert_eq!(diag.kind, ErrorKind::InvalidDuplicationFactor);
    assert_eq!(diag.context, "CTX");
    assert_eq!(diag.raw_line, "BAD DS 3-1F");
    assert!(layout.lookup("BAD").is_none());
    assert_eq!(layout.lookup("LATER").unwrap().displacement, 0);
}

// ---------------------------------------------------------------------------
//  Properties
// ---------------------------------------------------------------------------

#[test]
fn test_displacements_are_aligned() {
    let operands = ["C", "F", "X", "H", "CL3", "D", "B", "FD", "Y", "A", "P", "AD", "S", "V"];
    let records: Vec<NormalizedRecord> = operands
        .iter()
        .enumerate()
        .map(|(i, op)| rec(&format!("F{i}"), Directive::Ds, op))
        .collect();

    let mut session = LayoutSession::new();
    let layout = session.resolve("ALIGN", &records);
    assert!(layout.diagnostics.is_empty());

    for (i, op) in operands.iter().enumerate() {
        let code: String = op.chars().take_while(|c| *c != 'L').collect();
        let size = i64::from(DataType::from_code(&code).unwrap().byte_size());
        let entry = layout.lookup(&format!("F{i}")).unwrap();
        assert_eq!(entry.displacement % size, 0, "{op} at {}", entry.displacement);
    }
}

#[test]
fn test_resolve_twice_is_identical() {
    let records = [
        rec("A", Directive::Ds, "CL5"),
        rec("B", Directive::Equ, "C+2"),
        rec("C", Directive::Ds, "F"),
    ];
    let mut session = LayoutSession::new();
    let first = session.resolve("CTX", &records).clone();
    let second = session.resolve("CTX", &[]).clone();
    assert_eq!(first, second);
    assert_eq!(session.symbols().len(), 3);
}

#[test]
fn test_counter_monotonic_without_org() {
    let records: Vec<NormalizedRecord> = ["C", "H", "CL7", "F", "0D", "X", "3H"]
        .iter()
        .enumerate()
        .map(|(i, op)| rec(&format!("S{i}"), Directive::Ds, op))
        .collect();

    let mut session = LayoutSession::new();
    let layout = session.resolve("MONO", &records);
    let displacements: Vec<i64> = layout.symbols.iter().map(|e| e.displacement).collect();
    assert!(displacements.windows(2).all(|w| w[0] <= w[1]), "{displacements:?}");
}

#[test]
fn test_deferred_uses_counter_at_first_use() {
    let mut session = LayoutSession::new();
    let layout = session.resolve(
        "CTX",
        &[
            rec("HEAD", Directive::Ds, "CL10"),
            rec("MARK", Directive::Equ, "*"),
            rec("HERE", Directive::Equ, "*+L'TAIL"),
            rec("TAIL", Directive::Ds, "CL6"),
            rec("END", Directive::Ds, "CL20"),
        ],
    );

    assert_eq!(layout.lookup("MARK").unwrap().displacement, 10);
    // Counter was 10 when HERE was first seen; 36 by the retry pass.
    assert_eq!(layout.lookup("HERE").unwrap().displacement, 16);
}

#[test]
fn test_operator_precedence() {
    let lookups = Lookups::new(&NoSymbols, 0);
    assert_eq!(evaluate_operand("2+3*4", &lookups).unwrap().0, Value::Int(14));
    assert_eq!(evaluate_operand("(2+3)*4", &lookups).unwrap().0, Value::Int(20));

    let tokens = tokenize("2+3*4").unwrap();
    assert_eq!(evaluate(&tokens, &lookups).unwrap(), 14);
}

// ---------------------------------------------------------------------------
//  Sessions
// ---------------------------------------------------------------------------

#[test]
fn test_same_label_in_two_contexts() {
    let mut session = LayoutSession::new();
    session.resolve(
        "HEADER",
        &[rec("ID", Directive::Ds, "CL8"), rec("LEN", Directive::Ds, "H")],
    );
    session.resolve(
        "TRAILER",
        &[rec("COUNT", Directive::Ds, "F"), rec("LEN", Directive::Ds, "F")],
    );

    assert_eq!(session.layout("HEADER").unwrap().lookup("LEN").unwrap().displacement, 8);
    assert_eq!(session.layout("TRAILER").unwrap().lookup("LEN").unwrap().displacement, 4);
}

#[test]
fn test_explicit_cross_context_lookup() {
    let mut session = LayoutSession::new();
    session.resolve("HEADER", &[rec("NAME", Directive::Ds, "CL24")]);
    let layout = session
        .resolve(
            "COPY",
            &[
                rec("NAME", Directive::Ds, "CL(L'HEADER.NAME)"),
                rec("PLAIN", Directive::Ds, "CL(L'MISSING.NAME)"),
            ],
        )
        .clone();

    assert_eq!(layout.lookup("NAME").unwrap().length, 24);
    assert_eq!(layout.diagnostics.len(), 1);
    assert_eq!(layout.diagnostics[0].kind, ErrorKind::InvalidLengthKey);
}

#[test]
fn test_bad_line_does_not_stop_later_contexts() {
    let mut session = LayoutSession::new();
    session.resolve(
        "ONE",
        &[rec("A", Directive::Ds, "ZZL4"), rec("B", Directive::Equ, "X'XYZ'")],
    );
    let two = session.resolve("TWO", &[rec("C", Directive::Ds, "F")]).clone();

    assert!(two.diagnostics.is_empty());
    let kinds: Vec<ErrorKind> = session.diagnostics().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![ErrorKind::InvalidDataType, ErrorKind::InvalidHexLiteral]);
}

#[test]
fn test_forward_then_retry_diagnostic_order() {
    let mut session = LayoutSession::new();
    let layout = session.resolve(
        "CTX",
        &[
            rec("A", Directive::Ds, "CL(L'GHOST)"),
            rec("B", Directive::Equ, "GHOST"),
            rec("C", Directive::Ds, "Q"),
        ],
    );
    let kinds: Vec<ErrorKind> = layout.diagnostics.iter().map(|d| d.kind).collect();
    // Forward-pass failures first, then EQU retries, then DS retries.
    assert_eq!(
        kinds,
        vec![
            ErrorKind::InvalidDataType,
            ErrorKind::InvalidSymbolKey,
            ErrorKind::InvalidLengthKey,
        ]
    );
}

#[test]
fn test_redefinition_in_one_context_overwrites() {
    let mut session = LayoutSession::new();
    let layout = session.resolve(
        "CTX",
        &[
            rec("X", Directive::Ds, "F"),
            rec("X", Directive::Ds, "D"),
        ],
    );
    assert_eq!(layout.symbols.len(), 1);
    assert_eq!(layout.lookup("X").unwrap().displacement, 8);
}

#[test]
fn test_redefines_with_org() {
    let mut session = LayoutSession::new();
    let layout = session.resolve(
        "CTX",
        &[
            rec("DATE", Directive::Ds, "CL8"),
            unlabeled(Directive::Org, "DATE"),
            rec("YEAR", Directive::Ds, "CL4"),
            rec("MONTH", Directive::Ds, "CL2"),
            rec("DAY", Directive::Ds, "CL2"),
            unlabeled(Directive::Org, ""),
            rec("TIME", Directive::Ds, "F"),
        ],
    );

    assert_eq!(layout.lookup("MONTH").unwrap().displacement, 4);
    assert_eq!(layout.lookup("DAY").unwrap().displacement, 6);
    assert_eq!(layout.lookup("TIME").unwrap().displacement, 8);
    assert_eq!(layout.size, 12);
}

#[test]
fn test_dsect_in_middle_of_context() {
    let mut session = LayoutSession::new();
    let layout = session.resolve(
        "CTX",
        &[
            rec("HDR", Directive::Dsect, ""),
            rec("A", Directive::Ds, "CL3"),
            rec("BODY", Directive::Dsect, ""),
            rec("B", Directive::Ds, "F"),
        ],
    );
    let body = layout.lookup("BODY").unwrap();
    assert_eq!((body.displacement, body.length), (0, 0));
    assert_eq!(layout.lookup("B").unwrap().displacement, 4);
}

#[test]
fn test_equ_length_of_table() {
    let mut session = LayoutSession::new();
    let layout = session.resolve(
        "CTX",
        &[
            rec("TABLE", Directive::Ds, "10CL12"),
            rec("TABEND", Directive::Equ, "*"),
            rec("TABLEN", Directive::Equ, "TABEND-TABLE"),
            rec("ENTRIES", Directive::Equ, "TABLEN/L'TABLE"),
        ],
    );
    assert_eq!(layout.lookup("TABLEN").unwrap().displacement, 120);
    assert_eq!(layout.lookup("ENTRIES").unwrap().displacement, 10);
}

#[test]
fn test_session_evaluator_against_built_table() {
    let mut session = LayoutSession::new();
    session.resolve(
        "CTX",
        &[rec("A", Directive::Ds, "F"), rec("B", Directive::Ds, "CL8")],
    );

    let (value, tag) = session.evaluate("CTX", "B+L'B", 0).unwrap();
    assert_eq!(value, Value::Int(12));
    assert_eq!(tag, None);
    let err = session.evaluate("CTX", "NOSUCH", 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSymbolKey);

    let tokens = session.tokenize("B+R15").unwrap();
    assert_eq!(session.evaluate_tokens("CTX", &tokens, 0).unwrap(), 19);
}

#[test]
fn test_case_sensitive_session() {
    let config = LayoutConfig::from_toml_str("fold_case = false").unwrap();
    let mut session = LayoutSession::with_config(&config);
    let layout = session
        .resolve(
            "Ctx",
            &[rec("Field", Directive::Ds, "F"), rec("Copy", Directive::Ds, "CL(L'FIELD)")],
        )
        .clone();
    assert!(layout.lookup("Field").is_some());
    assert!(layout.lookup("FIELD").is_none());
    assert_eq!(layout.diagnostics[0].kind, ErrorKind::InvalidLengthKey);
    assert!(session.layout("CTX").is_none());
}

#[test]
fn test_layout_file_round_through_session() {
    let file = LayoutFile::from_json_str(
        r#"{
            "contexts": [
                { "name": "REC", "records": [
                    { "label": "KEY", "command": "DS", "operand": "CL10" },
                    { "label": "AMT", "command": "DS", "operand": "PL5" },
                    { "label": "CNT", "command": "DS", "operand": "H" }
                ] }
            ]
        }"#,
    )
    .unwrap();
    let mut session = LayoutSession::new();
    file.resolve_all(&mut session);

    let layout = session.layout("rec").unwrap();
    assert_eq!(layout.lookup("AMT").unwrap().displacement, 10);
    assert_eq!(layout.lookup("AMT").unwrap().length, 5);
    assert_eq!(layout.lookup("CNT").unwrap().displacement, 16);
}

// ---------------------------------------------------------------------------
//  Counter limits
// ---------------------------------------------------------------------------

#[test]
fn test_counter_overflow_becomes_diagnostic() {
    let mut session = LayoutSession::new();
    let layout = session
        .resolve(
            "HUGE",
            &[
                rec("BIG", Directive::Ds, "4294967295CL4294967295"),
                rec("OK", Directive::Ds, "H"),
            ],
        )
        .clone();
    assert_eq!(layout.diagnostics.len(), 1);
    assert_eq!(layout.diagnostics[0].kind, ErrorKind::EvaluationFailed);
    assert!(layout.lookup("BIG").is_none());
    assert_eq!(layout.lookup("OK").unwrap().displacement, 0);

    let layout = session.resolve(
        "HIGH",
        &[
            unlabeled(Directive::Org, "9223372036854775807"),
            rec("A", Directive::Ds, "F"),
        ],
    );
    assert_eq!(layout.diagnostics.len(), 1);
    assert_eq!(layout.diagnostics[0].kind, ErrorKind::EvaluationFailed);
    assert!(layout.lookup("A").is_none());
    assert_eq!(session.diagnostics().len(), 2);
}

#[test]
fn test_counter_inside_parenthesized_equ() {
    let mut session = LayoutSession::new();
    let layout = session.resolve(
        "CTX",
        &[
            rec("A", Directive::Ds, "CL8"),
            rec("HALF", Directive::Equ, "(*-A)/2"),
        ],
    );
    assert!(layout.diagnostics.is_empty());
    assert_eq!(layout.lookup("HALF").unwrap().displacement, 4);
}
