//! Drives each tokenizer through a small document the way the parser does

use anyhow::Result;
use edi_dialect::{Dialect, Tokenizer, tokenizer_for};

const ISA: &str = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *240101*1200*^*00501*000000001*0*P*:~";

fn segment_ids(tokenizer: &mut dyn Tokenizer) -> Vec<String> {
    let mut ids = Vec::new();
    while let Some(id) = tokenizer.current_segment_id() {
        ids.push(id.to_string());
        tokenizer.next_segment();
    }
    ids
}

#[test]
fn test_x12_walk() -> Result<()> {
    let input = format!(
        "{ISA}\nGS*PO*SENDER*RECEIVER*20240101*1200*1*X*005010~\nST*850*0001~\nBEG*00*SA*PO1**20240101~\nSE*3*0001~\nGE*1*1~\nIEA*1*000000001~\n"
    );
    let dialect = Dialect::detect(input.as_bytes()).expect("x12 detected");
    assert_eq!(dialect, Dialect::X12);

    let mut tokenizer = tokenizer_for(dialect, input.as_bytes())?;
    assert_eq!(
        segment_ids(tokenizer.as_mut()),
        vec!["ISA", "GS", "ST", "BEG", "SE", "GE", "IEA"]
    );
    assert!(tokenizer.take_errors().is_empty());
    Ok(())
}

#[test]
fn test_peek_then_consume() -> Result<()> {
    let input = "UNA:+.? 'UNB+UNOC:3+SENDER+RECEIVER+240101:1200+1'UNH+1+ORDERS:D:96A:UN'BGM+220+PO?+1+9'";
    let mut tokenizer = tokenizer_for(Dialect::Edifact, input.as_bytes())?;
    assert!(tokenizer.next_segment());
    assert!(tokenizer.next_segment());
    assert_eq!(tokenizer.current_segment_id(), Some("BGM"));

    // Peek the qualifier, then read the fields in order
    assert_eq!(tokenizer.data_element_at(1).map(|f| f.value()), Some("220"));
    let first = tokenizer.next_data_element().expect("first field");
    assert_eq!(first.value(), "220");
    tokenizer.reset_segment();
    let values: Vec<String> = std::iter::from_fn(|| tokenizer.next_data_element())
        .map(|f| f.value().to_string())
        .collect();
    assert_eq!(values, vec!["220", "PO+1", "9"]);
    Ok(())
}

#[test]
fn test_tradacoms_header() -> Result<()> {
    let input = "STX=ANA:1+5000000000000:SENDER+5010000000000:RECEIVER+240101:120000+REF1'MHD=1+ORDHDR:9'MTR=2'END=1'";
    assert_eq!(Dialect::detect(input.as_bytes()), Some(Dialect::Tradacoms));
    let mut tokenizer = tokenizer_for(Dialect::Tradacoms, input.as_bytes())?;
    let first = tokenizer.data_element_at(1).expect("STX1");
    assert_eq!(first.component(2), Some("1"));
    assert_eq!(
        segment_ids(tokenizer.as_mut()),
        vec!["STX", "MHD", "MTR", "END"]
    );
    Ok(())
}

#[test]
fn test_ach_fixed_width() -> Result<()> {
    let header = format!("101 091000019 1234567890240101{:64}", "");
    let batch = format!("5200ACME{:86}", "");
    let filler = "9".repeat(94);
    let input = format!("{header}\n{batch}\n{filler}\n");
    assert_eq!(Dialect::detect(input.as_bytes()), Some(Dialect::Ach));

    let mut tokenizer = tokenizer_for(Dialect::Ach, input.as_bytes())?;
    assert!(tokenizer.is_fixed_width());
    assert!(tokenizer.delimiters().is_none());
    assert_eq!(tokenizer.next_fixed_field(1).as_deref(), Some("1"));
    assert_eq!(tokenizer.next_fixed_field(2).as_deref(), Some("01"));
    assert_eq!(tokenizer.next_fixed_field(10).as_deref(), Some(" 091000019"));
    assert!(tokenizer.next_segment());
    assert_eq!(tokenizer.current_segment_id(), Some("5"));
    assert!(!tokenizer.next_segment());
    assert!(tokenizer.take_errors().is_empty());
    Ok(())
}

#[test]
fn test_malformed_isa_is_rejected() {
    let input = "ISA*00*short~";
    assert!(tokenizer_for(Dialect::X12, input.as_bytes()).is_err());
}
