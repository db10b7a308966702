//! Retrieval nodes
//!
//! Web search and document question answering. Both reach external
//! services, so executors come from the host.

use workflow_engine::{NodeCategory, NodeDescriptor, NodeTypeDefinition, PortSchema, PortType};

/// Runs a web search and returns the hits as an array
pub struct WebSearchNode;

impl WebSearchNode {
    pub const NODE_TYPE: &'static str = "web-search";
}

impl NodeDescriptor for WebSearchNode {
    fn definition() -> NodeTypeDefinition {
        NodeTypeDefinition::new(
            Self::NODE_TYPE,
            NodeCategory::Data,
            "Web Search",
            "Search the web and return matching pages",
        )
        .input(PortSchema::new("query", "Query", PortType::Text))
        .input(
            PortSchema::new("maxResults", "Max Results", PortType::Number)
                .with_default(serde_json::json!(5)),
        )
        .output(PortSchema::new("results", "Results", PortType::Array))
        .output(PortSchema::new("summary", "Summary", PortType::Text))
    }
}

/// Answers a question against an uploaded document
pub struct DocumentQueryNode;

impl DocumentQueryNode {
    pub const NODE_TYPE: &'static str = "document-query";
}

impl NodeDescriptor for DocumentQueryNode {
    fn definition() -> NodeTypeDefinition {
        NodeTypeDefinition::new(
            Self::NODE_TYPE,
            NodeCategory::Data,
            "Document Query",
            "Ask questions about a document",
        )
        .input(PortSchema::new("document", "Document", PortType::File))
        .input(PortSchema::new("query", "Query", PortType::Text))
        .output(PortSchema::new("answer", "Answer", PortType::Text))
        .output(PortSchema::new("passages", "Passages", PortType::Array))
    }
}

inventory::submit!(workflow_engine::DescriptorFn(WebSearchNode::definition));
inventory::submit!(workflow_engine::DescriptorFn(DocumentQueryNode::definition));
