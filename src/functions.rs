//! Bundled functions the assistant can call.
//!
//! `get_weather` is a stub (no weather backend is wired up yet);
//! `setup_account` posts a signup request to a clinic onboarding API. Both
//! report failures inside their output envelope so the model can react to
//! them in conversation.

use reqwest::{Client, StatusCode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::session::FunctionRegistry;

pub const DEFAULT_SIGNUP_URL: &str = "https://api.dev.arinternal.xyz/api/signup-basic";

const ACCOUNT_REQUIRED_FIELDS: [&str; 9] = [
    "firstname",
    "lastname",
    "email_id",
    "contact_number_1",
    "business_name",
    "business_address",
    "business_city",
    "business_state",
    "business_zip",
];

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WeatherArgs {
    /// The city and state, e.g. San Francisco, CA
    pub location: String,
}

#[derive(Debug, Serialize)]
pub struct WeatherReport {
    pub temp: i32,
    pub condition: String,
}

/// Both bundled functions in one registry.
#[must_use]
pub fn builtins(signup_url: impl Into<String>) -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    register_get_weather(&mut registry);
    register_setup_account(&mut registry, signup_url);
    registry
}

pub fn register_get_weather(registry: &mut FunctionRegistry) {
    registry.register(
        "get_weather",
        "Get current weather for a location",
        |args: WeatherArgs| async move {
            tracing::info!(location = %args.location, "fetching weather");
            // TODO: call a real weather API once one is picked.
            Ok(WeatherReport {
                temp: 72,
                condition: "Sunny".to_string(),
            })
        },
    );
}

pub fn register_setup_account(registry: &mut FunctionRegistry, signup_url: impl Into<String>) {
    let signup_url = signup_url.into();
    registry.register_json(
        "setup_account",
        "Setup a new account for an aesthetic clinic in Aesthetic Record EMR",
        account_parameters(),
        move |args| {
            let signup_url = signup_url.clone();
            async move { Ok(setup_account(&signup_url, args).await) }
        },
    );
}

fn account_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "firstname": { "type": "string", "description": "First name of clinic owner" },
            "lastname": { "type": "string", "description": "Last name of clinic owner" },
            "email_id": { "type": "string", "description": "Account email address" },
            "contact_number_1": { "type": "string", "description": "Phone with country code" },
            "business_name": { "type": "string", "description": "Clinic/business name" },
            "business_address": { "type": "string", "description": "Street address" },
            "business_city": { "type": "string", "description": "City" },
            "business_state": { "type": "string", "description": "State abbreviation" },
            "business_zip": { "type": "string", "description": "ZIP code" },
            "business_suite_number": { "type": "string", "description": "Suite/unit number" }
        },
        "required": ACCOUNT_REQUIRED_FIELDS
    })
}

async fn setup_account(signup_url: &str, args: Value) -> Value {
    let Some(fields) = args.as_object() else {
        return failure("arguments must be an object", Value::Null);
    };

    let missing: Vec<&str> = ACCOUNT_REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| {
            fields
                .get(*field)
                .and_then(Value::as_str)
                .is_none_or(str::is_empty)
        })
        .collect();
    if !missing.is_empty() {
        return failure(&format!("Missing fields: {}", missing.join(", ")), Value::Null);
    }

    let mut payload = fields.clone();
    payload.insert("business_country".to_string(), json!("US"));
    payload.insert("password".to_string(), json!(""));
    payload.insert("confirm_password".to_string(), json!(""));
    payload.insert("term_condition".to_string(), json!(1));
    payload.insert("agree_checkbox".to_string(), json!(1));
    payload.insert("invite_key".to_string(), json!(""));

    let response = match Client::new().post(signup_url).json(&payload).send().await {
        Ok(response) => response,
        Err(err) => return failure(&format!("signup request failed: {err}"), Value::Null),
    };

    let status = response.status();
    let data: Value = response.json().await.unwrap_or(Value::Null);

    if status == StatusCode::CREATED {
        return json!({
            "success": true,
            "message": "Account created successfully",
            "data": data.get("data").cloned().unwrap_or(Value::Null),
        });
    }

    let error = data
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Account creation failed")
        .to_string();
    failure(&error, data)
}

fn failure(error: &str, details: Value) -> Value {
    json!({
        "success": false,
        "error": error,
        "details": details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FunctionCall;
    use serde_json::json;

    #[tokio::test]
    async fn get_weather_returns_stub_report() {
        let registry = builtins(DEFAULT_SIGNUP_URL);
        let result = registry
            .dispatch(FunctionCall {
                name: "get_weather".to_string(),
                call_id: "c1".to_string(),
                arguments: json!({"location": "Austin, TX"}),
            })
            .await
            .unwrap();
        assert_eq!(result.output, json!({"temp": 72, "condition": "Sunny"}));
    }

    #[tokio::test]
    async fn setup_account_reports_missing_fields() {
        let registry = builtins(DEFAULT_SIGNUP_URL);
        let result = registry
            .dispatch(FunctionCall {
                name: "setup_account".to_string(),
                call_id: "c2".to_string(),
                arguments: json!({"firstname": "Ada", "lastname": "Lovelace"}),
            })
            .await
            .unwrap();
        assert_eq!(result.output["success"], json!(false));
        let error = result.output["error"].as_str().unwrap();
        assert!(error.contains("email_id"));
        assert!(error.contains("business_zip"));
        assert!(!error.contains("firstname"));
    }

    #[tokio::test]
    async fn setup_account_rejects_non_object_arguments() {
        let registry = builtins(DEFAULT_SIGNUP_URL);
        let result = registry
            .dispatch(FunctionCall {
                name: "setup_account".to_string(),
                call_id: "c3".to_string(),
                arguments: json!("not an object"),
            })
            .await
            .unwrap();
        assert_eq!(result.output["success"], json!(false));
    }

    #[test]
    fn builtins_advertise_both_functions() {
        let registry = builtins(DEFAULT_SIGNUP_URL);
        assert_eq!(registry.names(), vec!["get_weather", "setup_account"]);
    }
}
