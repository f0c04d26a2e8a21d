use super::*;

#[test]
fn code_record_serialization() {
    let record = CodeRecord {
        filename: "./src/app.py".to_string(),
        text: "def handler(event):\n    return event".to_string(),
        vector: vec![0.25, -0.5, 1.0],
    };

    let json = serde_json::to_string(&record).expect("can serialize json");
    let deserialized: CodeRecord = serde_json::from_str(&json).expect("can parse json");

    assert_eq!(record, deserialized);
}
