use log::*;
use serde_json::Value;
use sokoni_common::Cents;

use crate::{data_objects::CallbackOutcome, DarajaApiError};

/// Classifies an inbound Daraja callback envelope as a payment success or failure.
///
/// The envelope is treated as untrusted input. A callback only counts as a success when the result code is present,
/// equal to zero, *and* the metadata carries a receipt number; any missing or malformed field downgrades the outcome
/// to a failure. An envelope without a `CheckoutRequestID` cannot be correlated to an order at all and is rejected
/// outright.
pub fn classify_callback(envelope: &Value) -> Result<CallbackOutcome, DarajaApiError> {
    let stk_callback = &envelope["Body"]["stkCallback"];
    if stk_callback.is_null() {
        return Err(DarajaApiError::InvalidEnvelope("missing Body.stkCallback".to_string()));
    }
    let correlation_id = stk_callback["CheckoutRequestID"]
        .as_str()
        .ok_or_else(|| DarajaApiError::InvalidEnvelope("missing CheckoutRequestID".to_string()))?
        .to_string();
    let result_code = match stk_callback["ResultCode"].as_i64() {
        Some(code) => code,
        None => {
            warn!("📨️ Callback for [{correlation_id}] has no usable ResultCode. Treating as a failure.");
            return Ok(CallbackOutcome::Failure {
                correlation_id,
                result_code: -1,
                result_desc: "Callback did not include a result code".to_string(),
            });
        },
    };
    let result_desc = stk_callback["ResultDesc"].as_str().unwrap_or("No description provided").to_string();
    if result_code != 0 {
        return Ok(CallbackOutcome::Failure { correlation_id, result_code, result_desc });
    }
    let items = stk_callback["CallbackMetadata"]["Item"].as_array();
    let receipt_number = items.and_then(|items| metadata_string(items, "MpesaReceiptNumber"));
    let receipt_number = match receipt_number {
        Some(r) => r,
        None => {
            // A "success" with no receipt is not something we can reconcile against. Fail closed.
            warn!("📨️ Callback for [{correlation_id}] reported success but carried no receipt number.");
            return Ok(CallbackOutcome::Failure {
                correlation_id,
                result_code,
                result_desc: "Successful result had no receipt number".to_string(),
            });
        },
    };
    let amount = items.and_then(|items| metadata_number(items, "Amount")).map(Cents::from_shillings);
    let phone = items.and_then(|items| metadata_string(items, "PhoneNumber"));
    Ok(CallbackOutcome::Success { correlation_id, receipt_number, amount, phone })
}

fn metadata_item<'a>(items: &'a [Value], name: &str) -> Option<&'a Value> {
    items.iter().find(|item| item["Name"].as_str() == Some(name)).map(|item| &item["Value"])
}

fn metadata_string(items: &[Value], name: &str) -> Option<String> {
    metadata_item(items, name).and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn metadata_number(items: &[Value], name: &str) -> Option<i64> {
    metadata_item(items, name).and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn success_envelope() -> Value {
        json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            { "Name": "Amount", "Value": 2000 },
                            { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
                            { "Name": "TransactionDate", "Value": 20191219102115u64 },
                            { "Name": "PhoneNumber", "Value": 254708374149u64 }
                        ]
                    }
                }
            }
        })
    }

    #[test]
    fn successful_payment_is_classified() {
        let outcome = classify_callback(&success_envelope()).unwrap();
        match outcome {
            CallbackOutcome::Success { correlation_id, receipt_number, amount, phone } => {
                assert_eq!(correlation_id, "ws_CO_191220191020363925");
                assert_eq!(receipt_number, "NLJ7RT61SV");
                assert_eq!(amount, Some(Cents::from_shillings(2000)));
                assert_eq!(phone.as_deref(), Some("254708374149"));
            },
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn declined_payment_is_a_failure() {
        let envelope = json!({
            "Body": { "stkCallback": {
                "CheckoutRequestID": "ws_CO_123",
                "ResultCode": 1032,
                "ResultDesc": "Request cancelled by user"
            }}
        });
        let outcome = classify_callback(&envelope).unwrap();
        assert_eq!(outcome, CallbackOutcome::Failure {
            correlation_id: "ws_CO_123".to_string(),
            result_code: 1032,
            result_desc: "Request cancelled by user".to_string(),
        });
    }

    #[test]
    fn success_without_receipt_fails_closed() {
        let mut envelope = success_envelope();
        envelope["Body"]["stkCallback"]["CallbackMetadata"]["Item"] = json!([{ "Name": "Amount", "Value": 2000 }]);
        let outcome = classify_callback(&envelope).unwrap();
        assert!(matches!(outcome, CallbackOutcome::Failure { .. }), "missing receipt must not classify as success");
    }

    #[test]
    fn missing_result_code_fails_closed() {
        let envelope = json!({ "Body": { "stkCallback": { "CheckoutRequestID": "ws_CO_77" } } });
        let outcome = classify_callback(&envelope).unwrap();
        assert!(matches!(outcome, CallbackOutcome::Failure { .. }));
    }

    #[test]
    fn uncorrelatable_envelope_is_rejected() {
        let envelope = json!({ "Body": { "stkCallback": { "ResultCode": 0 } } });
        assert!(classify_callback(&envelope).is_err());
        assert!(classify_callback(&json!({"foo": "bar"})).is_err());
    }
}
