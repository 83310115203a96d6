//! Per-session task
//!
//! Consumes one connection's inbound frames strictly in order. Each tick's
//! delta is dispatched before the next frame is read, so moves from one
//! session never race each other.
//!
//! Camera decode and block matching run on the blocking pool; the pipeline
//! is moved into the worker and handed back, which keeps ordering without
//! holding a lock across the await.

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use super::error::{Result, SessionError};
use super::ingress::{FrameAssembler, Inbound};
use super::registry::{SessionId, SessionPhase, SessionRegistry};
use crate::config::{CameraConfig, Config, FusionConfig};
use crate::estimator::Delta;
use crate::fusion::FusionPipeline;
use crate::input::{CommandDispatcher, SharedPointer};
use crate::protocol::{ClientMessage, ProtocolError, ServerMessage, SessionConfig};

/// Process-wide collaborators every session needs
#[derive(Clone)]
pub struct SessionContext {
    /// Live session registry
    pub registry: Arc<SessionRegistry>,
    /// The OS pointer
    pub pointer: SharedPointer,
    /// Estimator tuning
    pub fusion: Arc<FusionConfig>,
    /// Camera block-matching tuning
    pub camera: Arc<CameraConfig>,
}

impl SessionContext {
    /// Build a context from server configuration
    pub fn new(config: &Config, registry: Arc<SessionRegistry>, pointer: SharedPointer) -> Self {
        Self {
            registry,
            pointer,
            fusion: Arc::new(config.fusion.clone()),
            camera: Arc::new(config.camera.clone()),
        }
    }
}

/// State and message loop for one connected device
pub struct SessionTask {
    id: SessionId,
    ctx: SessionContext,
    outbound: mpsc::Sender<ServerMessage>,
    dispatcher: CommandDispatcher,
    assembler: FrameAssembler,
    pipeline: Option<FusionPipeline>,
}

impl SessionTask {
    /// Register a new session
    pub async fn start(
        ctx: SessionContext,
        peer: impl Into<String>,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> Self {
        let id = ctx.registry.register(peer).await;
        let dispatcher = CommandDispatcher::new(ctx.pointer.clone());
        Self {
            id,
            ctx,
            outbound,
            dispatcher,
            assembler: FrameAssembler::new(),
            pipeline: None,
        }
    }

    /// Session identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Process inbound frames until the channel closes or a fatal error
    ///
    /// Held buttons are released and the session unregistered on every exit
    /// path.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<Inbound>) -> Result<()> {
        let span = info_span!("session", id = %self.id);
        async move {
            info!("Session started");
            let result = loop {
                let Some(frame) = inbound.recv().await else {
                    break Ok(());
                };
                if let Err(e) = self.handle(frame).await {
                    break Err(e);
                }
            };

            match &result {
                Ok(()) => info!("Session closed"),
                Err(e) => error!("Session terminated: {}", e),
            }
            self.teardown().await;
            result
        }
        .instrument(span)
        .await
    }

    /// Handle one inbound frame
    pub async fn handle(&mut self, frame: Inbound) -> Result<()> {
        match frame {
            Inbound::Text(text) => self.handle_text(&text).await,
            Inbound::Binary(payload) => self.handle_binary(payload).await,
        }
    }

    async fn handle_text(&mut self, text: &str) -> Result<()> {
        let message = match ClientMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                if let Err(abandoned) = self.assembler.interrupt() {
                    self.protocol_fault(abandoned).await?;
                }
                return self.protocol_fault(e).await;
            }
        };
        trace!("<- {}", message.kind());

        if !matches!(message, ClientMessage::CameraFrame(_)) {
            if let Err(abandoned) = self.assembler.interrupt() {
                self.protocol_fault(abandoned).await?;
            }
        }

        match message {
            ClientMessage::Hello {
                client_version,
                device,
            } => {
                info!(
                    "Hello from client {} ({})",
                    client_version,
                    device.as_deref().unwrap_or("unknown device")
                );
                self.ctx
                    .registry
                    .update(&self.id, |s| {
                        if s.phase == SessionPhase::Connected {
                            s.phase = SessionPhase::Identified;
                        }
                        s.client_version = Some(client_version);
                        s.device = device;
                    })
                    .await;
                self.send(ServerMessage::hello_ack()).await
            }

            ClientMessage::Config(request) => match SessionConfig::negotiate(request) {
                Ok(config) => {
                    let current = self.pipeline.as_ref().map(FusionPipeline::enabled);
                    match current {
                        Some(enabled) if enabled != config.enabled => {
                            self.protocol_fault(ProtocolError::InvalidConfig(
                                "enabled sources cannot change during a session".into(),
                            ))
                            .await
                        }
                        _ => self.configure(config).await,
                    }
                }
                Err(e) => self.protocol_fault(e).await,
            },

            ClientMessage::ImuSample(sample) => {
                let Some(delta) = self
                    .pipeline
                    .as_mut()
                    .map(|p| p.process_sample(&sample).delta)
                else {
                    trace!("Discarding imu.sample before config");
                    return Ok(());
                };
                self.dispatch_move(delta).await
            }

            ClientMessage::CameraFrame(header) => {
                if self.pipeline.is_none() {
                    trace!("Discarding cam.frame {} before config", header.seq);
                    return Ok(());
                }
                for fault in self.assembler.on_header(header) {
                    self.protocol_fault(fault).await?;
                }
                Ok(())
            }

            ClientMessage::Click { button, state } => {
                self.dispatcher.click(button, state)?;
                let last_button = self.dispatcher.last_button();
                let held = self.dispatcher.held_buttons();
                self.ctx
                    .registry
                    .update(&self.id, |s| {
                        s.last_button = last_button;
                        s.held_buttons = held;
                    })
                    .await;
                Ok(())
            }

            ClientMessage::Scroll { delta } => {
                self.dispatcher.scroll(delta)?;
                Ok(())
            }

            ClientMessage::MoveDelta { dx, dy } => {
                let Some(delta) = self.pipeline.as_ref().map(|p| p.direct_delta(dx, dy)) else {
                    trace!("Discarding move.delta before config");
                    return Ok(());
                };
                self.dispatch_move(delta).await
            }
        }
    }

    async fn handle_binary(&mut self, payload: Bytes) -> Result<()> {
        let camera_enabled = match self.pipeline.as_ref() {
            Some(pipeline) => pipeline.enabled().camera,
            None => {
                trace!("Discarding {}-byte payload before config", payload.len());
                return Ok(());
            }
        };

        let header = match self.assembler.on_payload() {
            Ok(header) => header,
            Err(e) => return self.protocol_fault(e).await,
        };

        if !camera_enabled {
            trace!("Camera disabled, dropping frame {}", header.seq);
            return Ok(());
        }

        let Some(mut pipeline) = self.pipeline.take() else {
            return Ok(());
        };
        let seq = header.seq;
        let (pipeline, result) = tokio::task::spawn_blocking(move || {
            let result = pipeline.process_frame(&header, &payload);
            (pipeline, result)
        })
        .await
        .map_err(|e| SessionError::Worker(e.to_string()))?;
        self.pipeline = Some(pipeline);

        match result {
            Ok(outcome) => {
                trace!("Frame {} -> {:?}", seq, outcome.arbitration);
                self.dispatch_move(outcome.delta).await
            }
            Err(e) => self.protocol_fault(e).await,
        }
    }

    async fn configure(&mut self, config: SessionConfig) -> Result<()> {
        let renegotiated = self.pipeline.is_some();
        info!(
            "{} sensitivity={} sources=[{}]",
            if renegotiated { "Reconfigured:" } else { "Configured:" },
            config.sensitivity,
            config
                .enabled
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(",")
        );

        let enabled = config.enabled;
        self.pipeline = Some(FusionPipeline::new(
            config,
            &self.ctx.fusion,
            &self.ctx.camera,
        ));
        self.assembler.reset();

        self.ctx
            .registry
            .update(&self.id, |s| {
                s.phase = SessionPhase::Configured;
                s.enabled = Some(enabled);
            })
            .await;
        self.send(ServerMessage::configured()).await
    }

    async fn dispatch_move(&mut self, delta: Delta) -> Result<()> {
        if self.dispatcher.move_by(delta)?.is_some() {
            let stats = self.dispatcher.stats();
            self.ctx
                .registry
                .update(&self.id, |s| {
                    s.moved_x = stats.moved_x;
                    s.moved_y = stats.moved_y;
                })
                .await;
        }
        Ok(())
    }

    async fn protocol_fault(&mut self, fault: ProtocolError) -> Result<()> {
        warn!("Protocol fault: {}", fault);
        if fault.notify_client() {
            self.send(ServerMessage::error(fault.to_string())).await?;
        }
        Ok(())
    }

    async fn send(&self, message: ServerMessage) -> Result<()> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| SessionError::OutboundClosed)
    }

    async fn teardown(&mut self) {
        let released = self.dispatcher.release_all();
        if !released.is_empty() {
            info!("Released held buttons: {:?}", released);
            self.ctx
                .registry
                .update(&self.id, |s| s.held_buttons.clear())
                .await;
        }
        self.pipeline = None;
        self.assembler.reset();
        if self.ctx.registry.unregister(&self.id).await.is_none() {
            debug!("Session already unregistered");
        }
    }
}
