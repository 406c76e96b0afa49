use common::{Error, MarketSignal};
use settings::{recommend, RecommenderConfig, Section, SettingsDocument};

const SET: &str = ";=====Basic=====\r\nMagic=1001\r\n;=====Take Profit=====\r\nTakeProfit=50||Y||10||200\r\n;=====Stop Loss=====\r\nStopLoss=30||Y||5||100\r\n";

fn utf16le_with_bom(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

#[test]
fn load_utf16_recommend_and_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strategy.set");
    std::fs::write(&path, utf16le_with_bom(SET)).unwrap();

    let doc = SettingsDocument::load(&path).unwrap();
    assert_eq!(doc.len(), 3);
    assert_eq!(doc.get("Magic").unwrap().section, Section::General);
    assert_eq!(doc.tunables().count(), 2);

    let rec = recommend(&doc, &MarketSignal::new(0.8), &RecommenderConfig::default());
    doc.with_updates(&rec).save(&path).unwrap();

    let saved = std::fs::read_to_string(&path).unwrap();
    assert!(saved.contains(";=====Take Profit=====\n"));
    assert!(saved.contains("TakeProfit=60||Y||10||200\n"));
    assert!(saved.contains("StopLoss=24||Y||5||100\n"));

    let reloaded = SettingsDocument::load(&path).unwrap();
    assert_eq!(reloaded.get_in(Section::TakeProfit, "TakeProfit").unwrap().current(), Some(60.0));
    assert_eq!(reloaded.get_in(Section::StopLoss, "StopLoss").unwrap().current(), Some(24.0));
    assert_eq!(reloaded.get("Magic").unwrap().raw, "1001");
}

#[test]
fn missing_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = SettingsDocument::load(dir.path().join("absent.set")).unwrap_err();
    match err {
        Error::Parse { file, .. } => assert!(file.ends_with("absent.set")),
        other => panic!("unexpected error: {other}"),
    }
}
