//! System prompt templates for classification, refinement and replies.
//!
//! Prompts are plain strings assembled from the configured persona. Sections
//! are delimited with tags so the model can tell instructions from data.

use concierge_core::config::PersonaConfig;
use concierge_core::types::{IntentLabel, Role, Turn};
use serde_json::json;

/// Marker placed in the grounded prompt when retrieval produced nothing.
pub const NO_CONTEXT_MARKER: &str = "[no information available]";

fn persona_block(persona: &PersonaConfig) -> String {
    format!(
        "<role>\n\
         You are {name}, the assistant of {company}, a company selling {business}. \
         You help customers over {channel} in a friendly, useful and organized way.\n\
         </role>\n\n\
         <communication_style>\n\
         - Informal and warm, suited to {channel}\n\
         - At most one or two emojis per reply\n\
         - Helpful and cheerful without exaggeration\n\
         </communication_style>",
        name = persona.assistant_name,
        company = persona.company,
        business = persona.business,
        channel = persona.channel,
    )
}

fn language_block(persona: &PersonaConfig) -> String {
    format!(
        "<language_policy>\n\
         1. Detect the language of the customer's message.\n\
         2. Reply in that same language.\n\
         3. If the language cannot be detected, reply in {}.\n\
         </language_policy>",
        persona.fallback_language
    )
}

fn label_description(label: IntentLabel) -> &'static str {
    match label {
        IntentLabel::Greeting => {
            "opening salutations with no other purpose (\"hi\", \"good morning\", \"how are you?\")"
        }
        IntentLabel::Information => {
            "questions about products, prices, specifications, location, opening hours, payment, policies or returns"
        }
        IntentLabel::ServiceRequest => {
            "explicit requests for a human agent, clear purchase intent, or questions about the buying process"
        }
        IntentLabel::Complaint => "dissatisfaction or problems with products or service",
        IntentLabel::Compliment => "positive comments about products, service or support",
        IntentLabel::Other => "anything that fits none of the categories above",
    }
}

/// Render turns as `role: content` lines.
pub fn history_excerpt(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| {
            let who = match t.role {
                Role::User => "customer",
                Role::Assistant => "assistant",
            };
            format!("{}: {}", who, t.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Classification prompt embedding the label set and a recent-history excerpt.
pub fn classification_prompt(persona: &PersonaConfig, recent: &[Turn]) -> String {
    let rules = IntentLabel::ALL
        .iter()
        .map(|label| format!("- \"{}\": {}", label, label_description(*label)))
        .collect::<Vec<_>>()
        .join("\n");

    let history = if recent.is_empty() {
        "(no previous messages)".to_string()
    } else {
        history_excerpt(recent)
    };

    format!(
        "<task>\n\
         Classify the intent of the customer's latest message for {company}, \
         a company selling {business}. Use the recent conversation only to disambiguate.\n\
         The message may be written in any language.\n\
         </task>\n\n\
         <classification_rules>\n\
         Choose exactly ONE of these labels:\n\
         {rules}\n\
         </classification_rules>\n\n\
         <recent_history>\n\
         {history}\n\
         </recent_history>\n\n\
         <output_requirements>\n\
         Reply ONLY with a JSON object of the form\n\
         {{\"intent\": \"<label>\", \"confidence\": <number between 0 and 1>, \"rationale\": \"<short reason>\"}}\n\
         The intent value must be one of the labels above, spelled exactly as shown. \
         Never translate the label.\n\
         </output_requirements>",
        company = persona.company,
        business = persona.business,
        rules = rules,
        history = history,
    )
}

/// JSON schema requested from the text generator for classification.
pub fn classification_schema() -> serde_json::Value {
    let labels: Vec<&str> = IntentLabel::ALL.iter().map(|l| l.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "intent": { "type": "string", "enum": labels },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "rationale": { "type": "string" }
        },
        "required": ["intent"],
        "additionalProperties": false
    })
}

/// Prompt rewriting a customer message into a retrieval-friendly query.
pub fn refinement_prompt(language: &str) -> String {
    let translate = if language.trim().is_empty() {
        "5. Keep the query in its original language.".to_string()
    } else {
        format!("5. Translate the query into {}.", language.trim())
    };
    format!(
        "You improve customer questions before they are searched in a knowledge base.\n\n\
         1. Read the customer's latest message.\n\
         2. Read the conversation history.\n\
         3. Keep only the aspects relevant to what the customer wants to know.\n\
         4. Make the question objective and clear.\n\
         {translate}\n\n\
         Reply with the rewritten query only, without quotes or explanations."
    )
}

/// Greeting reply. Introduces the assistant only on first contact.
pub fn greeting_prompt(
    persona: &PersonaConfig,
    customer_name: Option<&str>,
    already_introduced: bool,
) -> String {
    let presentation = if already_introduced {
        "You have already introduced yourself in this conversation: do not do it again.".to_string()
    } else {
        format!(
            "This is the first contact: briefly introduce yourself as {} from {}.",
            persona.assistant_name, persona.company
        )
    };
    let name = match customer_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("The customer's name is {}; greet them by name.", name),
        None => "The customer's name is unknown.".to_string(),
    };

    format!(
        "{persona}\n\n\
         <task>\n\
         Reply to the customer's greeting:\n\
         1. Return the greeting.\n\
         2. {presentation}\n\
         3. Set a positive tone and offer help.\n\
         4. Use at most two short lines.\n\
         {name}\n\
         </task>\n\n\
         {language}\n\n\
         <do_not>\n\
         - Do not provide information that is not in this prompt.\n\
         </do_not>",
        persona = persona_block(persona),
        language = language_block(persona),
    )
}

/// Acknowledgement for service requests and complaints handed to a human.
pub fn handoff_prompt(persona: &PersonaConfig, intent: IntentLabel) -> String {
    let situation = match intent {
        IntentLabel::Complaint => {
            "The customer is unhappy. Acknowledge the problem with empathy and apologise for the inconvenience."
        }
        _ => "The customer wants to be served by a person or to move forward with a purchase.",
    };
    format!(
        "{persona}\n\n\
         <task>\n\
         {situation}\n\
         - Tell the customer you are forwarding the conversation to a human agent.\n\
         - Always give the phone number {phone} to reach the agent, formatted for {channel}.\n\
         </task>\n\n\
         {language}",
        persona = persona_block(persona),
        phone = persona.handoff_phone,
        channel = persona.channel,
        language = language_block(persona),
    )
}

/// Short thank-you for compliments.
pub fn compliment_prompt(persona: &PersonaConfig) -> String {
    format!(
        "{}\n\n\
         <task>\n\
         You just received a compliment. Thank the customer warmly in one or two short lines.\n\
         </task>\n\n\
         {}",
        persona_block(persona),
        language_block(persona),
    )
}

/// Polite redirection for out-of-scope messages.
pub fn redirect_prompt(persona: &PersonaConfig) -> String {
    format!(
        "{}\n\n\
         <task>\n\
         The customer's message is outside what you can help with. Say so politely, \
         remind them what {} can help with, and ask whether they would like to be \
         connected to a human agent.\n\
         </task>\n\n\
         {}",
        persona_block(persona),
        persona.company,
        language_block(persona),
    )
}

/// Grounded answer prompt. `context` is `None` when retrieval found nothing.
pub fn grounded_prompt(persona: &PersonaConfig, query: &str, context: Option<&str>) -> String {
    let (context_text, rules) = match context {
        Some(ctx) => (
            ctx.to_string(),
            "- Answer using ONLY the information in [context].\n\
             - Keep prices, currencies and figures exactly as written in [context].\n\
             - Prefer sharing links and images that appear in [context]."
                .to_string(),
        ),
        None => (
            NO_CONTEXT_MARKER.to_string(),
            format!(
                "- There is no information about this question. Say plainly that you do not \
                 have that information right now.\n\
                 - Do NOT state prices, specifications, dates or any other specific fact.\n\
                 - Offer to connect the customer with a human agent at {}.",
                persona.handoff_phone
            ),
        ),
    };

    format!(
        "{persona}\n\n\
         <objective>\n\
         Write the best possible reply to the customer's question (query) using the \
         available information (context). The reply is sent over {channel}, so keep it \
         clear and well formatted for that channel.\n\
         </objective>\n\n\
         <input>\n\
         [query]\n{query}\n[/query]\n\n\
         [context]\n{context_text}\n[/context]\n\
         </input>\n\n\
         <rules>\n\
         {rules}\n\
         - Use bullets to organise lists; avoid HTML and code.\n\
         </rules>\n\n\
         {language}\n\n\
         <expected_output>\n\
         Only the final reply to send to the customer.\n\
         </expected_output>",
        persona = persona_block(persona),
        channel = persona.channel,
        language = language_block(persona),
    )
}
