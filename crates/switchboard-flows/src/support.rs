use std::sync::Arc;

use tracing::info;

use switchboard_core::config::ModelConfig;
use switchboard_core::error::Result;
use switchboard_core::traits::{ImageAnalyzer, LlmClient, OrderService, Retriever};
use switchboard_graph::{
    ActionContext, Graph, GraphBuilder, ModelRouted, Node, NodeSpec, ParamSchema,
    RetrievalBinding, BACKUP_NODE,
};

use crate::actions;
use crate::prompts;

/// Collaborators of the support flow.
#[derive(Clone)]
pub struct SupportDeps {
    pub llm: Arc<dyn LlmClient>,
    pub model: ModelConfig,
    pub orders: Arc<dyn OrderService>,
    pub policies: Arc<dyn Retriever>,
    pub shop: Arc<dyn Retriever>,
    /// Enables the `product_condition` photo assessment node.
    pub vision: Option<Arc<dyn ImageAnalyzer>>,
}

impl SupportDeps {
    fn routed(&self, template: &str) -> ModelRouted {
        ModelRouted::new(template, self.model.clone(), self.llm.clone())
    }
}

fn user_message() -> ParamSchema {
    ParamSchema::new().string("user_message", "message sent by the user")
}

fn order_id_and_message(message: &str) -> ParamSchema {
    ParamSchema::new()
        .integer("order_id", "Order identification numeric code")
        .string("system_message", message)
}

fn backup_params() -> ParamSchema {
    let mut params = ParamSchema::new()
        .string("user_message", "The most recent message sent by the user")
        .string(
            "route_info",
            "Information about which pipeline routed to this node, including error details or special handling requirements",
        )
        .string(
            "error_type",
            "Classification of error or special request type if identified",
        );
    if let Some(spec) = params.get_mut("error_type") {
        spec.extra.insert("default".into(), "unspecified".into());
    }
    params
}

/// Wrap an order-service action into a node action.
macro_rules! with_orders {
    ($deps:expr, $action:path) => {{
        let orders = $deps.orders.clone();
        move |ctx: ActionContext| $action(orders.clone(), ctx)
    }};
}

/// Assemble the customer-support conversation graph.
pub fn build_support_graph(deps: &SupportDeps) -> Result<Graph> {
    let root_template = if deps.vision.is_some() {
        prompts::ROOT_WITH_IMAGE
    } else {
        prompts::ROOT
    };
    let root = Node::model_routed(
        NodeSpec::new("root", "Entry point to determine user intent", user_message()),
        deps.routed(root_template),
    )?;
    let mut graph = GraphBuilder::new(root.clone());

    // Default pipelines
    let default_node = Node::model_routed(
        NodeSpec::new(
            "default_node",
            "Conversation guide for unclear requests or off-topic queries",
            user_message(),
        ),
        deps.routed(prompts::DEFAULT_NODE),
    )?;
    graph.connect("root", &default_node)?;

    let shopping = Node::model_routed(
        NodeSpec::new(
            "shopping_chatting",
            "Product and shopping information specialist",
            user_message(),
        ),
        deps.routed(prompts::SHOPPING)
            .with_retrieval(RetrievalBinding::similarity(deps.shop.clone(), 4, 0.6)),
    )?;
    graph.connect("root", &shopping)?;

    let policies = Node::model_routed(
        NodeSpec::new(
            "policies_questions",
            "Company policy and customer service information specialist",
            user_message(),
        ),
        deps.routed(prompts::POLICIES)
            .with_retrieval(RetrievalBinding::similarity(deps.policies.clone(), 3, 0.6)),
    )?;
    graph.connect("root", &policies)?;

    let just_chatting = Node::interactive_action(
        NodeSpec::new(
            "just_chatting",
            "Flexible conversation handler",
            user_message().string("system_message", "chat bot message or error handling response"),
        ),
        actions::flexible_handler,
    )?;
    graph.connect("default_node", &just_chatting)?;
    graph.connect("shopping_chatting", &just_chatting)?;
    graph.connect("policies_questions", &just_chatting)?;
    graph.connect("just_chatting", &root)?;

    let backup = Node::model_routed(
        NodeSpec::new(
            BACKUP_NODE,
            "Emergency response system for handling exceptions, errors, and special user situations",
            backup_params(),
        ),
        deps.routed(prompts::BACKUP)
            .with_retrieval(RetrievalBinding::mmr(deps.policies.clone(), 2, 0.5)),
    )?;
    graph.connect("root", &backup)?;
    graph.connect(BACKUP_NODE, &just_chatting)?;

    build_cancellation(deps, &mut graph, &root, &backup)?;
    build_tracking(deps, &mut graph, &backup)?;

    if let Some(analyzer) = &deps.vision {
        let product_condition = Node::vision(
            NodeSpec::new(
                "product_condition",
                "Assess the condition of a product from the photo the user attached",
                ParamSchema::new().string("image", "Path or URL of the attached product photo"),
            ),
            analyzer.clone(),
        )?;
        graph.connect("root", &product_condition)?;
    }

    let graph = graph.build();
    info!(nodes = graph.len(), edges = graph.edges().len(), "Support graph assembled");
    Ok(graph)
}

fn build_cancellation(
    deps: &SupportDeps,
    graph: &mut GraphBuilder,
    root: &Node,
    backup: &Node,
) -> Result<()> {
    let cancel = Node::model_routed(
        NodeSpec::new("Cancell_Order", "Order cancellation intent detection", user_message()),
        deps.routed(prompts::CANCEL),
    )?;
    graph.connect("root", &cancel)?;

    let order_id_request = Node::interactive_action(
        NodeSpec::new(
            "orderID_request",
            "Interactive function to collect Order ID when not provided",
            user_message().string("system_message", "chat bot message to request for the order id"),
        ),
        actions::request_order_id,
    )?;
    graph.connect("Cancell_Order", &order_id_request)?;
    graph.connect("orderID_request", &cancel)?;

    let sending_code = Node::interactive_action(
        NodeSpec::new(
            "sending_verification_code",
            "Send the 2-step verification code to the email address associated with the Order ID",
            order_id_and_message(
                "chat bot message to request for the 2-step code sent to order associated email address",
            ),
        ),
        with_orders!(deps, actions::send_verification_code),
    )?;
    graph.connect("Cancell_Order", &sending_code)?;

    let preprocess_code = Node::model_routed(
        NodeSpec::new(
            "preprocesing_code",
            "Extract and validate verification code",
            user_message(),
        ),
        deps.routed(prompts::PREPROCESS_CODE),
    )?;
    graph.connect("sending_verification_code", &preprocess_code)?;
    graph.connect("preprocesing_code", backup)?;

    let check_request = Node::interactive_action(
        NodeSpec::new(
            "check_cancelation_request",
            "Verify order status and eligibility for cancellation based on company policy",
            ParamSchema::new()
                .integer("order_id", "Order identification numeric code")
                .integer("2-step_code", "6 digit long integer")
                .string("system_message", "chat bot message for reason collection or confirmation"),
        ),
        with_orders!(deps, actions::check_verification_code),
    )?;
    graph.connect("preprocesing_code", &check_request)?;

    let motivations = Node::model_routed(
        NodeSpec::new(
            "preprocessing_motivations",
            "Process customer's cancellation reason",
            user_message(),
        ),
        deps.routed(prompts::PREPROCESS_MOTIVATIONS).with_retrieval(
            RetrievalBinding::mmr(deps.policies.clone(), 2, 0.8).with_filter("Cancelation process"),
        ),
    )?;
    graph.connect("check_cancelation_request", &motivations)?;
    graph.connect("preprocessing_motivations", &check_request)?;
    graph.connect("preprocessing_motivations", backup)?;

    let finalize = Node::action(
        NodeSpec::new(
            "finilizing_cancelation",
            "Complete the cancellation process and provide refund information",
            ParamSchema::new()
                .integer("order_id", "Order identification numeric code")
                .string("motivations", "summary of explicit user's motivations for cancellation")
                .string(
                    "system_message",
                    "chat bot message confirming cancellation with relevant policy details",
                ),
        ),
        with_orders!(deps, actions::cancel_order),
    )?;
    graph.connect("preprocessing_motivations", &finalize)?;

    let regret = Node::action(
        NodeSpec::new(
            "regret_cancelation",
            "User regret cancellation intent detection",
            order_id_and_message("chat bot message confirming cancellation is not processed"),
        ),
        actions::return_to_root,
    )?;
    graph.connect("preprocessing_motivations", &regret)?;
    graph.connect("preprocesing_code", &regret)?;
    graph.connect("regret_cancelation", root)?;
    Ok(())
}

fn build_tracking(deps: &SupportDeps, graph: &mut GraphBuilder, backup: &Node) -> Result<()> {
    let track = Node::model_routed(
        NodeSpec::new("Track_Order", "Order tracking intent detection", user_message()),
        deps.routed(prompts::TRACK),
    )?;
    graph.connect("root", &track)?;

    let order_id_request = Node::interactive_action(
        NodeSpec::new(
            "orderID_request2",
            "Interactive function to collect Order ID when not provided",
            user_message().string("system_message", "chat bot message to request for the order id"),
        ),
        actions::request_order_id,
    )?;
    graph.connect("Track_Order", &order_id_request)?;
    graph.connect("orderID_request2", &track)?;

    let status_check = Node::action(
        NodeSpec::new(
            "status_check",
            "Retrieve the current status of the order from tracking database",
            order_id_and_message("chat bot message with current order status information"),
        ),
        with_orders!(deps, actions::order_status_check),
    )?;
    graph.connect("Track_Order", &status_check)?;

    let status_processing = Node::model_routed(
        NodeSpec::new(
            "status_processing",
            "Explain the order status and next steps to the customer",
            ParamSchema::new()
                .integer("order_id", "Order identification numeric code")
                .string("status", "Current status of the order in the tracking pipeline")
                .string("tracking_events", "Description of order traces"),
        ),
        deps.routed(prompts::STATUS_PROCESSING),
    )?;
    graph.connect("status_check", &status_processing)?;
    graph.connect("status_processing", backup)?;

    let status_explanation = Node::interactive_action(
        NodeSpec::new(
            "status_explanation",
            "Explain the current status of the order and offer notification updates",
            order_id_and_message(
                "chat bot message with current order status information and asking if user would like to update their notification preferences",
            ),
        ),
        with_orders!(deps, actions::tracking_info),
    )?;
    graph.connect("status_processing", &status_explanation)?;

    let preference = Node::model_routed(
        NodeSpec::new(
            "notification_preference",
            "Process user's notification preferences request",
            user_message(),
        ),
        deps.routed(prompts::NOTIFICATION_PREFERENCE).with_retrieval(
            RetrievalBinding::mmr(deps.policies.clone(), 2, 0.8).with_filter("Tracking"),
        ),
    )?;
    graph.connect("status_explanation", &preference)?;
    graph.connect("notification_preference", backup)?;

    let update = Node::action(
        NodeSpec::new(
            "update_notifications",
            "Update notification intent detection",
            ParamSchema::new()
                .integer("order_id", "Order identification numeric code")
                .boolean("email_notifications", "Whether to enable email notifications")
                .boolean("sms_notifications", "Whether to enable SMS notifications")
                .boolean("app_notifications", "Whether to enable mobile app notifications")
                .string("phone_number", "Phone number for SMS notifications, if enabled")
                .string("system_message", "chat bot message confirming notification preference updates"),
        )
        .required(&["system_message", "order_id"]),
        actions::update_notification_preferences,
    )?;
    graph.connect("notification_preference", &update)?;

    let finish = Node::action(
        NodeSpec::new(
            "tracking_finilizing",
            "Finalizing order tracking",
            order_id_and_message("chat bot message confirming cancellation is not processed"),
        ),
        actions::return_to_root,
    )?;
    graph.connect("notification_preference", &finish)?;
    Ok(())
}
