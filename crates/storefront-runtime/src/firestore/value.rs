//! JSON <-> Firestore typed value conversion

use serde_json::{Map, Number, Value, json};

/// Encode a JSON value as a Firestore `Value`
pub fn encode(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode an object as a Firestore `fields` map
pub fn encode_fields(map: &Map<String, Value>) -> Value {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), encode(v))).collect())
}

/// Decode a Firestore `Value` into plain JSON
///
/// Timestamps, references and bytes decode to their string form; geo
/// points to `{latitude, longitude}`.
pub fn decode(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "booleanValue" => inner.as_bool().map_or(Value::Null, Value::Bool),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .or_else(|| inner.as_i64())
            .map_or(Value::Null, |i| Value::Number(i.into())),
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" | "geoPointValue" => {
            inner.clone()
        }
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

/// Decode a Firestore `fields` map
pub fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields.iter().map(|(k, v)| (k.clone(), decode(v))).collect()
}

/// Quote a field path segment unless it is a simple identifier
pub fn field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_payment_payload() {
        let encoded = encode(&json!({
            "id": 123,
            "status": "approved",
            "transaction_amount": 49.9,
            "captured": true,
            "fee_details": [],
            "metadata": null
        }));

        let fields = &encoded["mapValue"]["fields"];
        assert_eq!(fields["id"], json!({"integerValue": "123"}));
        assert_eq!(fields["status"], json!({"stringValue": "approved"}));
        assert_eq!(fields["transaction_amount"], json!({"doubleValue": 49.9}));
        assert_eq!(fields["captured"], json!({"booleanValue": true}));
        assert_eq!(fields["fee_details"], json!({"arrayValue": {"values": []}}));
        assert_eq!(fields["metadata"], json!({"nullValue": null}));
    }

    #[test]
    fn test_decode_document_fields() {
        let fields = json!({
            "statusPagamentoMP": {"stringValue": "approved"},
            "ultimaAtualizacaoWebhook": {"timestampValue": "2026-10-15T12:00:00.123Z"},
            "items": {"arrayValue": {"values": [
                {"mapValue": {"fields": {
                    "quantity": {"integerValue": "2"},
                    "unit_price": {"doubleValue": 50.5}
                }}}
            ]}}
        });

        let decoded = decode_fields(fields.as_object().unwrap());
        assert_eq!(decoded["statusPagamentoMP"], "approved");
        assert_eq!(decoded["ultimaAtualizacaoWebhook"], "2026-10-15T12:00:00.123Z");
        assert_eq!(decoded["items"][0]["quantity"], 2);
        assert_eq!(decoded["items"][0]["unit_price"], 50.5);
    }

    #[test]
    fn test_field_path_quoting() {
        assert_eq!(field_path("statusPagamentoMP"), "statusPagamentoMP");
        assert_eq!(field_path("preco-promocional"), "`preco-promocional`");
        assert_eq!(field_path("1st"), "`1st`");
    }
}
