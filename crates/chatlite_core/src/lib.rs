pub mod domain;
pub mod ports;
pub mod protocol;

pub use domain::{
    ChatSession, DeliveryStatus, EmbedMode, Message, MessageRole, PageContext, RuntimeState,
    Theme, VerificationStatus, WidgetPosition, WidgetSettings, WidgetSize,
};
pub use ports::{
    BackendService, ChromeSkin, EmbedHandle, EmbedHost, EmbedSpec, PortError, PortResult,
    VisitorStore,
};
pub use protocol::{ChannelMessage, Envelope, ScriptConfig, SettingsPatch};
