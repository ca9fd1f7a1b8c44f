//! services/widget/src/adapters/host.rs
//!
//! A headless implementation of the `EmbedHost` port. It applies every
//! container transition to an in-memory record and traces it, which is all
//! the standalone harness needs and gives tests something to snapshot.

use async_trait::async_trait;
use chatlite_core::domain::WidgetPosition;
use chatlite_core::ports::{ChromeSkin, EmbedHandle, EmbedHost, EmbedSpec, PortError, PortResult};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Observable state of one mounted embed.
#[derive(Debug, Clone)]
pub struct EmbedRecord {
    pub url: String,
    pub position: WidgetPosition,
    pub width: u32,
    pub height: u32,
    pub chrome: ChromeSkin,
    pub visible: bool,
    pub removed: bool,
}

/// Observable state of the whole headless document.
#[derive(Debug, Clone, Default)]
pub struct HostRecord {
    pub embed: Option<EmbedRecord>,
    pub offline_notice: Option<String>,
}

#[derive(Default)]
pub struct HeadlessHost {
    record: Arc<Mutex<HostRecord>>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the current document state, for tests and diagnostics.
    pub fn snapshot(&self) -> HostRecord {
        self.record.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

fn lock_record(record: &Arc<Mutex<HostRecord>>) -> PortResult<std::sync::MutexGuard<'_, HostRecord>> {
    record
        .lock()
        .map_err(|_| PortError::Unexpected("embed host lock poisoned".to_string()))
}

#[async_trait]
impl EmbedHost for HeadlessHost {
    async fn create_embed(&self, spec: &EmbedSpec) -> PortResult<Box<dyn EmbedHandle>> {
        let mut record = lock_record(&self.record)?;
        info!(
            "creating embed at {} ({}x{} px, {})",
            spec.url, spec.width, spec.height, spec.position
        );
        record.embed = Some(EmbedRecord {
            url: spec.url.clone(),
            position: spec.position,
            width: spec.width,
            height: spec.height,
            chrome: ChromeSkin::Chromeless,
            visible: true,
            removed: false,
        });
        Ok(Box::new(HeadlessHandle {
            record: self.record.clone(),
        }))
    }

    async fn show_offline_notice(&self, position: WidgetPosition, text: &str) -> PortResult<()> {
        let mut record = lock_record(&self.record)?;
        if record.offline_notice.is_some() {
            return Ok(());
        }
        info!("showing offline notice at {}: {}", position, text);
        record.offline_notice = Some(text.to_string());
        Ok(())
    }

    async fn remove_offline_notice(&self) -> PortResult<()> {
        let mut record = lock_record(&self.record)?;
        record.offline_notice = None;
        Ok(())
    }
}

struct HeadlessHandle {
    record: Arc<Mutex<HostRecord>>,
}

impl HeadlessHandle {
    fn with_embed(&self, apply: impl FnOnce(&mut EmbedRecord)) -> PortResult<()> {
        let mut record = lock_record(&self.record)?;
        match record.embed.as_mut() {
            Some(embed) if !embed.removed => {
                apply(embed);
                Ok(())
            }
            _ => Err(PortError::NotFound("embed already removed".to_string())),
        }
    }
}

#[async_trait]
impl EmbedHandle for HeadlessHandle {
    async fn set_chrome(&self, skin: ChromeSkin) -> PortResult<()> {
        self.with_embed(|embed| {
            info!("switching embed chrome to {:?}", skin);
            embed.chrome = skin;
        })
    }

    async fn set_height(&self, height_px: u32) -> PortResult<()> {
        self.with_embed(|embed| embed.height = height_px)
    }

    async fn set_visible(&self, visible: bool) -> PortResult<()> {
        self.with_embed(|embed| embed.visible = visible)
    }

    async fn remove(&self) -> PortResult<()> {
        let mut record = lock_record(&self.record)?;
        if let Some(embed) = record.embed.as_mut() {
            embed.removed = true;
            embed.visible = false;
        }
        Ok(())
    }
}
