//! Deterministic steps of the support flow.
//!
//! Interactive steps route to their single child and hand a message back to
//! the user; the others either feed the next node or end the turn.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use switchboard_core::error::Result;
use switchboard_core::traits::OrderService;
use switchboard_graph::{ActionContext, NodeOutput};

pub const VERIFICATION_FAILED: &str =
    "There was a problem with verification, contact the call center or try it again later";

pub const CANCELLATION_PROBLEM: &str =
    "There was a problem, contact the call center or try it again later";

const ERROR_INDICATORS: [&str; 6] = [
    "cannot process",
    "error",
    "failed",
    "unable to complete",
    "technical difficulty",
    "system error",
];

const ESCALATION_INDICATORS: [&str; 6] = [
    "speak to human",
    "customer service",
    "representative",
    "this is not working",
    "frustrated",
    "annoying",
];

/// Ask the user for their order id.
pub async fn request_order_id(ctx: ActionContext) -> Result<NodeOutput> {
    let message = ctx.str_arg("system_message")?.to_string();
    Ok(NodeOutput::route(ctx.first_child()?, Value::String(message)))
}

/// Send the verification code and remember the order details.
pub async fn send_verification_code(
    orders: Arc<dyn OrderService>,
    ctx: ActionContext,
) -> Result<NodeOutput> {
    let order_id = ctx.int_arg("order_id")?;
    let message = ctx.str_arg("system_message")?;

    orders.send_two_step_code(order_id).await?;
    let details = orders.order_details(order_id, false).await?;

    Ok(NodeOutput::route(
        ctx.first_child()?,
        json!({"order_id": order_id, "system_message": message}),
    )
    .with_callback(details.to_map()))
}

/// Check the verification code; a rejected code ends the turn.
pub async fn check_verification_code(
    orders: Arc<dyn OrderService>,
    ctx: ActionContext,
) -> Result<NodeOutput> {
    let order_id = ctx.int_arg("order_id")?;
    let code = ctx.int_arg("2-step_code")?;

    let verified = orders.verify_two_step_code(order_id, code).await?;
    let details = orders.order_details(order_id, false).await?;

    if !verified {
        warn!(order_id, "Verification code rejected");
        return Ok(NodeOutput::finish(json!(VERIFICATION_FAILED)).with_callback(details.to_map()));
    }

    let message = format!("Verification was successful. {}", ctx.str_arg("system_message")?);
    Ok(NodeOutput::route(ctx.first_child()?, Value::String(message)).with_callback(details.to_map()))
}

/// Cancel the order and report how it went.
pub async fn cancel_order(orders: Arc<dyn OrderService>, ctx: ActionContext) -> Result<NodeOutput> {
    let order_id = ctx.int_arg("order_id")?;
    let reason = ctx.str_arg("motivations")?;
    let message = ctx.str_arg("system_message")?;

    let order = orders.cancel_order(order_id, reason).await?;
    let status = order.status.unwrap_or_default();
    info!(order_id, status = %status, "Cancellation processed");

    let reply = match status.as_str() {
        "cancelled" => message.to_string(),
        "shipped" | "delivered" => format!("The order can't be cancelled because it's {status}"),
        _ => CANCELLATION_PROBLEM.to_string(),
    };
    Ok(NodeOutput::finish(Value::String(reply)))
}

/// End the flow with the model's closing message.
pub async fn return_to_root(ctx: ActionContext) -> Result<NodeOutput> {
    Ok(NodeOutput::finish(json!(ctx.str_arg("system_message")?)))
}

/// Fetch the tracking record for the next node to explain.
pub async fn order_status_check(
    orders: Arc<dyn OrderService>,
    ctx: ActionContext,
) -> Result<NodeOutput> {
    let order_id = ctx.int_arg("order_id")?;
    let tracking = orders.track_order(order_id).await?;
    Ok(NodeOutput::route(ctx.first_child()?, serde_json::to_value(tracking)?))
}

/// Confirm the new notification preferences.
pub async fn update_notification_preferences(ctx: ActionContext) -> Result<NodeOutput> {
    info!(
        order_id = ctx.int_arg("order_id")?,
        email = ctx.args.get("email_notifications").and_then(|v| v.as_bool()),
        sms = ctx.args.get("sms_notifications").and_then(|v| v.as_bool()),
        app = ctx.args.get("app_notifications").and_then(|v| v.as_bool()),
        "Notification preferences updated"
    );
    Ok(NodeOutput::finish(json!(ctx.str_arg("system_message")?)))
}

/// Show the status explanation and keep the order details around.
pub async fn tracking_info(orders: Arc<dyn OrderService>, ctx: ActionContext) -> Result<NodeOutput> {
    let order_id = ctx.int_arg("order_id")?;
    let message = ctx.str_arg("system_message")?;
    let details = orders.order_details(order_id, true).await?;
    Ok(NodeOutput::route(
        ctx.first_child()?,
        json!({"order_id": order_id, "system_message": message}),
    )
    .with_callback(details.to_map()))
}

/// Relay a message and hand the conversation back, apologising when the
/// message reports an error and offering a human when the user is annoyed.
pub async fn flexible_handler(ctx: ActionContext) -> Result<NodeOutput> {
    let user_message = ctx.str_arg_or("user_message", "").to_lowercase();
    let system_message = ctx.str_arg_or("system_message", "");
    let lowered = system_message.to_lowercase();

    let reply = if ERROR_INDICATORS.iter().any(|i| lowered.contains(i)) {
        "I apologize for the difficulty. Let's start over. How can I assist you today?".to_string()
    } else if ESCALATION_INDICATORS.iter().any(|i| user_message.contains(i)) {
        "I understand this may be frustrating. Would you like me to connect you with customer service? In the meantime, I'm happy to try addressing your concerns differently.".to_string()
    } else {
        system_message.to_string()
    };
    Ok(NodeOutput::route(ctx.first_child()?, Value::String(reply)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::types::{OrderDetails, ToolDefinition};
    use switchboard_test_utils::{InMemoryOrderService, VALID_CODE};

    fn ctx(args: Value) -> ActionContext {
        ActionContext {
            node: "test".into(),
            args,
            trace: false,
            children: vec![ToolDefinition {
                name: "next_step".into(),
                description: "next".into(),
                input_schema: json!({"type": "object"}),
            }],
        }
    }

    fn orders() -> Arc<InMemoryOrderService> {
        Arc::new(
            InMemoryOrderService::new()
                .with_order(OrderDetails::new(555).with_status("processing"))
                .with_order(OrderDetails::new(777).with_status("shipped")),
        )
    }

    #[tokio::test]
    async fn test_request_order_id() {
        let out = request_order_id(ctx(json!({
            "user_message": "cancel my order",
            "system_message": "Could you share your order id?"
        })))
        .await
        .unwrap();
        assert_eq!(out.next.as_deref(), Some("next_step"));
        assert_eq!(out.payload, json!("Could you share your order id?"));
        assert!(out.callback.is_empty());
    }

    #[tokio::test]
    async fn test_send_verification_code_for_the_requested_order() {
        let svc = orders();
        let out = send_verification_code(
            svc.clone(),
            ctx(json!({"order_id": 555, "system_message": "Enter the code we emailed you"})),
        )
        .await
        .unwrap();
        assert_eq!(svc.sent_codes(), vec![555]);
        assert_eq!(out.payload["order_id"], 555);
        assert_eq!(out.callback["status"], "processing");
    }

    #[tokio::test]
    async fn test_check_verification_code() {
        let svc = orders();
        let ok = check_verification_code(
            svc.clone(),
            ctx(json!({"order_id": 555, "2-step_code": VALID_CODE, "system_message": "Why do you want to cancel?"})),
        )
        .await
        .unwrap();
        assert_eq!(ok.next.as_deref(), Some("next_step"));
        assert_eq!(ok.payload, json!("Verification was successful. Why do you want to cancel?"));

        let rejected = check_verification_code(
            svc,
            ctx(json!({"order_id": 555, "2-step_code": 111111, "system_message": "x"})),
        )
        .await
        .unwrap();
        assert_eq!(rejected.next, None);
        assert_eq!(rejected.payload, json!(VERIFICATION_FAILED));
    }

    #[tokio::test]
    async fn test_cancel_order_outcomes() {
        let svc = orders();
        let done = cancel_order(
            svc.clone(),
            ctx(json!({"order_id": 555, "motivations": "found it cheaper", "system_message": "Your order is cancelled."})),
        )
        .await
        .unwrap();
        assert_eq!(done.next, None);
        assert_eq!(done.payload, json!("Your order is cancelled."));
        assert_eq!(svc.order(555).unwrap().status.as_deref(), Some("cancelled"));

        let refused = cancel_order(
            svc,
            ctx(json!({"order_id": 777, "motivations": "late", "system_message": "Your order is cancelled."})),
        )
        .await
        .unwrap();
        assert_eq!(refused.payload, json!("The order can't be cancelled because it's shipped"));
    }

    #[tokio::test]
    async fn test_cancel_unknown_order_fails() {
        let err = cancel_order(
            orders(),
            ctx(json!({"order_id": 1, "motivations": "x", "system_message": "y"})),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_order_status_check_feeds_tracking() {
        let out = order_status_check(orders(), ctx(json!({"order_id": 777, "system_message": "x"})))
            .await
            .unwrap();
        assert_eq!(out.next.as_deref(), Some("next_step"));
        assert_eq!(out.payload["status"], "shipped");
        assert_eq!(out.payload["tracking_events"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_tracking_info_stores_details() {
        let out = tracking_info(
            orders(),
            ctx(json!({"order_id": 777, "system_message": "Shipped yesterday. Want SMS updates?"})),
        )
        .await
        .unwrap();
        assert_eq!(out.callback["tracking_id"], "TRACK-777");
        assert_eq!(out.payload["system_message"], "Shipped yesterday. Want SMS updates?");
    }

    #[tokio::test]
    async fn test_terminal_messages() {
        let out = return_to_root(ctx(json!({"order_id": 555, "system_message": "No problem, your order stays."})))
            .await
            .unwrap();
        assert_eq!(out.next, None);
        assert_eq!(out.payload, json!("No problem, your order stays."));

        let out = update_notification_preferences(ctx(json!({
            "order_id": 555,
            "sms_notifications": true,
            "system_message": "SMS notifications enabled."
        })))
        .await
        .unwrap();
        assert_eq!(out.payload, json!("SMS notifications enabled."));
    }

    #[tokio::test]
    async fn test_notification_preferences_tolerate_missing_and_odd_flags() {
        let out = update_notification_preferences(ctx(json!({
            "order_id": "555",
            "email_notifications": false,
            "app_notifications": "yes",
            "system_message": "Email notifications disabled."
        })))
        .await
        .unwrap();
        assert_eq!(out.next, None);
        assert_eq!(out.payload, json!("Email notifications disabled."));

        let err = update_notification_preferences(ctx(json!({"system_message": "hi"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("order_id"));
    }

    #[tokio::test]
    async fn test_flexible_handler() {
        let relay = flexible_handler(ctx(json!({"user_message": "thanks", "system_message": "Anything else?"})))
            .await
            .unwrap();
        assert_eq!(relay.payload, json!("Anything else?"));
        assert_eq!(relay.next.as_deref(), Some("next_step"));

        let error = flexible_handler(ctx(json!({"user_message": "hm", "system_message": "A system error occurred"})))
            .await
            .unwrap();
        assert!(error.payload.as_str().unwrap().starts_with("I apologize"));

        let human = flexible_handler(ctx(json!({"user_message": "I want to speak to human", "system_message": "ok"})))
            .await
            .unwrap();
        assert!(human.payload.as_str().unwrap().contains("customer service"));
    }
}
