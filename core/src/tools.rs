use serde_json::{json, Value};

use crate::types::{FunctionCall, FunctionDeclaration, Tool};

/// Name of the stock-check tool.
pub const CHECK_STOCK: &str = "checkStock";
/// Name of the consultation-booking tool.
pub const BOOK_CONSULTATION: &str = "bookConsultation";

/// The two fixed tool declarations shared by the text and voice sessions.
/// Static, process-wide, never mutated.
pub fn pharmacy_tool_declarations() -> Vec<FunctionDeclaration> {
    vec![
        FunctionDeclaration {
            name: CHECK_STOCK.to_string(),
            description: Some(
                "Check if a specific medication or health product is currently in stock at the pharmacy."
                    .to_string(),
            ),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "productName": {
                        "type": "STRING",
                        "description": "The name of the medication or product to check."
                    }
                },
                "required": ["productName"]
            }),
        },
        FunctionDeclaration {
            name: BOOK_CONSULTATION.to_string(),
            description: Some(
                "Schedule a professional consultation with a clinical specialist.".to_string(),
            ),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "date": {
                        "type": "STRING",
                        "description": "Preferred date for the consultation (YYYY-MM-DD)."
                    },
                    "specialty": {
                        "type": "STRING",
                        "description": "The area of health concern (e.g., Pediatrics, Geriatrics, Chronic Pain)."
                    }
                },
                "required": ["date", "specialty"]
            }),
        },
    ]
}

/// Tool set for deep-analysis chat turns and the voice session.
pub fn function_tool_set() -> Vec<Tool> {
    vec![Tool::FunctionDeclarations(pharmacy_tool_declarations())]
}

/// Tool set for normal chat turns: web grounding only.
pub fn grounding_tool_set() -> Vec<Tool> {
    vec![Tool::GoogleSearch {}]
}

/// Outcome of resolving a tool call locally.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub status: String,
    pub message: String,
}

impl ToolOutcome {
    /// JSON payload for a functionResponse part.
    pub fn to_value(&self) -> Value {
        json!({
            "result": {
                "status": self.status,
                "message": self.message,
            }
        })
    }
}

/// Resolve a model-issued tool call with a deterministic local stub.
///
/// Resolution never fails: unknown names produce a generic completion
/// rather than failing the turn or the session.
pub fn resolve_tool(call: &FunctionCall) -> ToolOutcome {
    match call.name.as_str() {
        CHECK_STOCK => {
            let product = call
                .args
                .get("productName")
                .and_then(Value::as_str)
                .unwrap_or("The requested product");
            ToolOutcome {
                status: "Checking...".to_string(),
                message: format!("{} is likely in stock at our Wuse branch.", product),
            }
        }
        BOOK_CONSULTATION => ToolOutcome {
            status: "Success".to_string(),
            message: "Consultation scheduled successfully. We will reach out for confirmation."
                .to_string(),
        },
        _ => ToolOutcome {
            status: "Success".to_string(),
            message: "Task completed.".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Value) -> FunctionCall {
        FunctionCall {
            name: name.to_string(),
            args,
        }
    }

    #[test]
    fn declarations_are_the_two_fixed_tools() {
        let decls = pharmacy_tool_declarations();
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].name, CHECK_STOCK);
        assert_eq!(decls[1].name, BOOK_CONSULTATION);
    }

    #[test]
    fn check_stock_uses_product_name() {
        let outcome = resolve_tool(&call(CHECK_STOCK, json!({"productName": "Paracetamol"})));
        assert!(outcome.message.contains("Paracetamol"));
        assert!(outcome.message.contains("in stock"));
    }

    #[test]
    fn check_stock_without_args_still_resolves() {
        let outcome = resolve_tool(&call(CHECK_STOCK, Value::Null));
        assert!(outcome.message.contains("in stock"));
    }

    #[test]
    fn unknown_tool_resolves_to_generic_completion() {
        let outcome = resolve_tool(&call("somethingElse", json!({})));
        assert_eq!(outcome.message, "Task completed.");
    }

    #[test]
    fn outcome_value_nests_result() {
        let outcome = resolve_tool(&call(BOOK_CONSULTATION, json!({})));
        let value = outcome.to_value();
        assert!(value["result"]["message"]
            .as_str()
            .unwrap()
            .contains("Consultation scheduled"));
    }
}
