use crate::reminder::Reminder;
use serde_json::Value;

/// Result of decoding the persisted collection.
#[derive(Debug, Default)]
pub struct Decoded {
    pub reminders: Vec<Reminder>,
    /// Records skipped because they could not be parsed
    pub dropped: usize,
}

/// Fields a record must carry to be kept. `note` and `status` have defaults
/// so files written before `status` existed still load.
const REQUIRED_FIELDS: [&str; 3] = ["title", "datetime", "repeat"];

/// Decodes a JSON array of records, dropping individual records that fail.
///
/// Returns `Err` only when the document itself is unusable.
pub fn decode_collection(content: &str) -> Result<Decoded, String> {
    let document: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let Value::Array(items) = document else {
        return Err("expected a JSON array of reminders".to_string());
    };

    let mut decoded = Decoded::default();
    for (index, item) in items.into_iter().enumerate() {
        match decode_record(item) {
            Ok(reminder) => decoded.reminders.push(reminder),
            Err(reason) => {
                tracing::warn!(index, %reason, "dropping malformed reminder record");
                decoded.dropped += 1;
            }
        }
    }
    Ok(decoded)
}

fn decode_record(item: Value) -> Result<Reminder, String> {
    let Value::Object(fields) = &item else {
        return Err("record is not an object".to_string());
    };
    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !fields.contains_key(**f)) {
        return Err(format!("missing field `{}`", missing));
    }
    serde_json::from_value(item).map_err(|e| e.to_string())
}

pub fn encode_collection(reminders: &[Reminder]) -> Result<String, String> {
    serde_json::to_string_pretty(reminders).map_err(|e| e.to_string())
}
