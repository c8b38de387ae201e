//! These models represent the objects passed around by the assistant
//!
//! There are several different related formats we need to interact with:
//! - turn requests/responses, sent between the http interface and the assistant
//! - openai messages/tools, sent from the assistant to the LLM
//! - json-rpc tool calls, sent from the assistant to the tool service
//! - broker http payloads, returned by the tools as json
//!
//! We always immediately convert those data models into the internal structs using
//! to/from helpers. Because of the need for compatibility, the internal models are
//! not an exact match to any of these formats.
pub mod code;
pub mod content;
pub mod message;
pub mod role;
pub mod routing;
pub mod tool;
