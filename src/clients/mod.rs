pub mod fake_gateway;
pub mod model_gateway;

pub use fake_gateway::{RecordedRequest, ScriptedGateway, ScriptedReply};
pub use model_gateway::{GatewayRequest, GatewayResponse, ModelGateway, OpenAiGateway};
