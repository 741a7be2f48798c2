/*
 *  bridge.rs
 *
 *  bigclock - synchronized clock faces
 *  (c) 2020-26 Stuart Hunter
 *
 *  JSON lines host bridge: events in on stdin, commands out on stdout
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use async_trait::async_trait;
use log::{debug, error, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::{BridgeError, HostError};
use crate::host::CellHandle;
use crate::lifecycle::LifecycleManager;
use crate::settings::RawSettings;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SettingsPayload {
    #[serde(default)]
    pub settings: RawSettings,
}

/// Inbound event, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostEvent {
    WillAppear {
        context: String,
        #[serde(default)]
        payload: SettingsPayload,
    },
    WillDisappear {
        context: String,
    },
    DidReceiveSettings {
        context: String,
        #[serde(default)]
        payload: SettingsPayload,
    },
    SendToPlugin {
        context: String,
        #[serde(default)]
        payload: RawSettings,
    },
    KeyDown {
        context: String,
        #[serde(default)]
        payload: SettingsPayload,
    },
}

impl HostEvent {
    pub fn context(&self) -> &str {
        match self {
            HostEvent::WillAppear { context, .. }
            | HostEvent::WillDisappear { context }
            | HostEvent::DidReceiveSettings { context, .. }
            | HostEvent::SendToPlugin { context, .. }
            | HostEvent::KeyDown { context, .. } => context,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImagePayload {
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitlePayload {
    pub title: String,
}

/// Outbound command, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostCommand {
    SetImage { context: String, payload: ImagePayload },
    SetTitle { context: String, payload: TitlePayload },
    SetSettings { context: String, payload: RawSettings },
}

/// Commands allowed to wait for stdout before pushes start failing.
pub const COMMAND_QUEUE_DEPTH: usize = 256;

/// Handle for one context, writing commands to the shared output channel.
pub struct StdioHandle {
    context: String,
    tx: mpsc::Sender<HostCommand>,
    last_settings: Mutex<RawSettings>,
}

impl StdioHandle {
    fn new(context: &str, tx: mpsc::Sender<HostCommand>) -> Self {
        Self {
            context: context.to_string(),
            tx,
            last_settings: Mutex::new(RawSettings::default()),
        }
    }

    fn remember(&self, settings: &RawSettings) {
        *self.last_settings.lock() = settings.clone();
    }

    // a full queue means stdout stalled; failing the push lets the tick evict the cell
    fn send(&self, command: HostCommand) -> Result<(), HostError> {
        self.tx.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => HostError::Unavailable(format!("output queue full for {}", self.context)),
            TrySendError::Closed(_) => HostError::Unavailable(format!("output closed for {}", self.context)),
        })
    }
}

#[async_trait]
impl CellHandle for StdioHandle {
    async fn set_image(&self, image: &str) -> Result<(), HostError> {
        self.send(HostCommand::SetImage {
            context: self.context.clone(),
            payload: ImagePayload { image: image.to_string() },
        })
    }

    async fn set_title(&self, title: &str) -> Result<(), HostError> {
        self.send(HostCommand::SetTitle {
            context: self.context.clone(),
            payload: TitlePayload { title: title.to_string() },
        })
    }

    async fn save_settings(&self, settings: &RawSettings) -> Result<(), HostError> {
        self.remember(settings);
        self.send(HostCommand::SetSettings {
            context: self.context.clone(),
            payload: settings.clone(),
        })
    }

    async fn read_settings(&self) -> Result<RawSettings, HostError> {
        Ok(self.last_settings.lock().clone())
    }
}

/// Routes decoded host events to the lifecycle manager.
pub struct Bridge {
    lifecycle: LifecycleManager,
    handles: HashMap<String, Arc<StdioHandle>>,
    tx: mpsc::Sender<HostCommand>,
}

impl Bridge {
    pub fn new(lifecycle: LifecycleManager) -> (Self, mpsc::Receiver<HostCommand>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        (Self { lifecycle, handles: HashMap::new(), tx }, rx)
    }

    fn handle_for(&mut self, context: &str) -> Arc<StdioHandle> {
        self.handles
            .entry(context.to_string())
            .or_insert_with(|| Arc::new(StdioHandle::new(context, self.tx.clone())))
            .clone()
    }

    pub async fn dispatch(&mut self, event: HostEvent) {
        debug!("host event: {:?}", event);
        match event {
            HostEvent::WillAppear { context, payload } => {
                let handle = self.handle_for(&context);
                handle.remember(&payload.settings);
                self.lifecycle.on_shown(&context, handle, payload.settings).await;
            }
            HostEvent::WillDisappear { context } => {
                self.lifecycle.on_hidden(&context);
                self.handles.remove(&context);
            }
            HostEvent::DidReceiveSettings { context, payload } => {
                let handle = self.handle_for(&context);
                handle.remember(&payload.settings);
                self.lifecycle.on_settings_changed(&context, handle, payload.settings).await;
            }
            HostEvent::SendToPlugin { context, payload } => {
                let handle = self.handle_for(&context);
                self.lifecycle.on_inspector_message(&context, handle, payload).await;
            }
            HostEvent::KeyDown { context, payload } => {
                let handle = self.handle_for(&context);
                self.lifecycle.on_key_pressed(&context, handle, payload.settings).await;
            }
        }
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<(), BridgeError> {
        let event: HostEvent = serde_json::from_str(line)?;
        self.dispatch(event).await;
        Ok(())
    }

    /// Read events until EOF. Malformed lines are logged and skipped.
    pub async fn run<R>(&mut self, reader: R) -> Result<(), BridgeError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Err(e) = self.handle_line(line).await {
                warn!("skipping host line: {}", e);
            }
        }
        debug!("host input closed");
        Ok(())
    }
}

/// Serialize commands to `writer`, one per line, until the channel closes.
pub async fn write_commands<W>(mut rx: mpsc::Receiver<HostCommand>, mut writer: W) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = rx.recv().await {
        let mut line = serde_json::to_vec(&command)?;
        line.push(b'\n');
        if let Err(e) = writer.write_all(&line).await {
            error!("failed to write host command: {}", e);
            return Err(e.into());
        }
        writer.flush().await?;
    }
    Ok(())
}
