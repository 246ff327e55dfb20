//! Response normalisation shared by both prediction services.

use serde_json::Value;

use ecoroute_core::ForecastFrame;

/// Build `<base>/<country>`, inserting the slash when the base lacks one.
pub fn service_url(base: &str, country_code: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{country_code}")
    } else {
        format!("{base}/{country_code}")
    }
}

/// Turn a service response into rows plus reported execution carbon.
///
/// Accepted shapes:
/// - `{"data": [...], "execution_carbon_kg": <number>}` (carbon defaults to 0.0)
/// - a bare array of records (carbon 0.0)
///
/// Anything else is an error string describing the shape problem.
pub fn normalize_payload(payload: Value) -> Result<(ForecastFrame, f64), String> {
    let (rows, emissions) = match payload {
        Value::Object(mut map) if map.contains_key("data") => {
            let rows = match map.remove("data") {
                Some(Value::Array(rows)) => rows,
                Some(Value::Null) | None => Vec::new(),
                Some(other) => return Err(format!("'data' is not a list (got {})", kind(&other))),
            };
            let emissions = match map.remove("execution_carbon_kg") {
                None | Some(Value::Null) => 0.0,
                Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
                Some(other) => {
                    return Err(format!("'execution_carbon_kg' is not a number (got {})", kind(&other)));
                }
            };
            (rows, emissions)
        }
        Value::Array(rows) => (rows, 0.0),
        other => return Err(format!("expected an object with 'data' or a list, got {}", kind(&other))),
    };

    let frame = ForecastFrame::from_records(rows).map_err(|e| e.to_string())?;
    Ok((frame, emissions))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
