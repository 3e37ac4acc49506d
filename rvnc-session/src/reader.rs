//! The reader task: the post-handshake server message loop.
//!
//! One task per session blocks on the transport, demultiplexes the four
//! server-to-client message types, drives rectangle decoding into the
//! shared framebuffer, and posts events to the host. It also maintains the
//! update cadence: after fully consuming a FramebufferUpdate it posts the
//! next FramebufferUpdateRequest, incremental unless the host asked for a
//! full refresh in the meantime.
//!
//! The loop stops on the shutdown signal (a `disconnect()` in progress,
//! which emits the `ConnectionLost` event itself) or on any read, protocol
//! or decode error, which is fatal for the connection: there is no way to
//! resynchronize a byte stream after a malformed message.

use crate::errors::SessionError;
use crate::events::{ConnectionState, SessionEvent};
use crate::registry::DecoderRegistry;
use crate::{BoxedReader, FramebufferHandle, SharedOutput};
use rvnc_common::Rect;
use rvnc_pixels::{ColorMap, PixelFormat};
use rvnc_wire::io::RfbInStream;
use rvnc_wire::messages::{FramebufferUpdateRequest, Rectangle, ServerCutText, SetColorMapEntries};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

pub(crate) struct ReaderContext {
    pub input: RfbInStream<BoxedReader>,
    pub output: SharedOutput,
    pub framebuffer: FramebufferHandle,
    pub events: flume::Sender<SessionEvent>,
    pub state: Arc<parking_lot::Mutex<ConnectionState>>,
    /// The format rectangles arrive in: the canonical format the client
    /// forced with SetPixelFormat before requesting any update.
    pub format: PixelFormat,
    pub colors: ColorMap,
    pub registry: DecoderRegistry,
    pub width: u16,
    pub height: u16,
    pub full_refresh: Arc<AtomicBool>,
    pub alive: Arc<AtomicBool>,
    pub lost: Arc<AtomicBool>,
}

pub(crate) async fn run(mut ctx: ReaderContext, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            result = next_message(&mut ctx) => {
                if let Err(err) = result {
                    tracing::warn!("connection lost: {err}");
                    report_loss(&ctx, Some(err.to_string()));
                    return;
                }
            }
        }
    }
    tracing::debug!("reader task stopped by shutdown signal");
}

/// Record the loss and emit `ConnectionLost` unless someone already did.
fn report_loss(ctx: &ReaderContext, reason: Option<String>) {
    ctx.alive.store(false, Ordering::SeqCst);
    *ctx.state.lock() = ConnectionState::Disconnected;
    if !ctx.lost.swap(true, Ordering::SeqCst) {
        let _ = ctx.events.send(SessionEvent::ConnectionLost { reason });
    }
}

async fn next_message(ctx: &mut ReaderContext) -> Result<(), SessionError> {
    let message_type = ctx.input.read_u8().await?;
    match message_type {
        0 => handle_framebuffer_update(ctx).await,
        1 => {
            let msg = SetColorMapEntries::read_from(&mut ctx.input).await?;
            let colors: Vec<(u16, u16, u16)> = msg
                .colors
                .iter()
                .map(|c| (c.red, c.green, c.blue))
                .collect();
            ctx.colors.set_entries(msg.first_color, &colors);
            tracing::debug!(
                "color map updated: {} entries from {}",
                colors.len(),
                msg.first_color
            );
            Ok(())
        }
        2 => {
            let _ = ctx.events.send(SessionEvent::Bell);
            Ok(())
        }
        3 => {
            let msg = ServerCutText::read_from(&mut ctx.input).await?;
            let _ = ctx.events.send(SessionEvent::ServerCutText(msg.text));
            Ok(())
        }
        other => Err(SessionError::Protocol(format!(
            "unknown server message type {}",
            other
        ))),
    }
}

async fn handle_framebuffer_update(ctx: &mut ReaderContext) -> Result<(), SessionError> {
    ctx.input.skip(1).await?; // padding
    let count = ctx.input.read_u16().await?;
    tracing::trace!("framebuffer update with {} rectangles", count);

    let bounds = Rect::new(0, 0, ctx.width as u32, ctx.height as u32);
    let mut damage = Rect::new(0, 0, 0, 0);
    for _ in 0..count {
        let rect = Rectangle::read_from(&mut ctx.input).await?;
        let region = Rect::new(
            rect.x as i32,
            rect.y as i32,
            rect.width as u32,
            rect.height as u32,
        );

        if !bounds.contains_rect(&region) {
            return Err(SessionError::Protocol(format!(
                "rectangle {}x{} at ({}, {}) outside the {}x{} framebuffer",
                rect.width, rect.height, rect.x, rect.y, ctx.width, ctx.height
            )));
        }

        let decoder = ctx.registry.get(rect.encoding).ok_or_else(|| {
            SessionError::Protocol(format!("unknown encoding {}", rect.encoding))
        })?;

        let mut framebuffer = ctx.framebuffer.lock().await;
        decoder
            .decode(
                &mut ctx.input,
                &rect,
                &ctx.format,
                &ctx.colors,
                &mut framebuffer,
            )
            .await
            .map_err(SessionError::Decode)?;
        drop(framebuffer);

        damage = damage.union(&region);
    }

    let _ = ctx.events.send(SessionEvent::FramebufferUpdated(damage));

    // Keep the request/response cadence going; a pending full-refresh
    // request downgrades exactly one emission to non-incremental.
    let incremental = !ctx.full_refresh.swap(false, Ordering::SeqCst);
    let request = FramebufferUpdateRequest {
        incremental,
        x: 0,
        y: 0,
        width: ctx.width,
        height: ctx.height,
    };
    let mut output = ctx.output.lock().await;
    request.write_to(&mut output);
    output.flush().await?;
    Ok(())
}
