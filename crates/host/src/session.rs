//! The canvas session.
//!
//! One task owns the canvas. Everything else (protocol readers, the
//! background loader, timers) talks to it through [`SessionEvent`]s on an
//! mpsc channel and never touches the canvas directly.

use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vcanvas_core::{Axis, Debouncer, Point, Size, VirtualCanvas};
use vcanvas_protocol::{CanvasCommand, CanvasResponse, ItemSpec, PaintStats, SessionState};
use vcanvas_surface::{MemorySurface, RecordingPainter};

/// The canvas type a session drives.
pub type Canvas = VirtualCanvas<ItemSpec, MemorySurface, RecordingPainter>;

const CHANNEL_CAPACITY: usize = 100;

/// Events that the session loop processes.
#[derive(Debug)]
pub enum SessionEvent {
    /// A protocol command from a client.
    Command {
        cmd: CanvasCommand,
        responder: oneshot::Sender<CanvasResponse>,
    },
    /// Items produced by the background loader.
    LoaderBatch(Vec<ItemSpec>),
    /// The layout quiet period may have elapsed.
    LayoutQuiet,
    /// Shutdown signal.
    Shutdown,
}

/// Create the session channel.
pub fn channel() -> (mpsc::Sender<SessionEvent>, mpsc::Receiver<SessionEvent>) {
    mpsc::channel(CHANNEL_CAPACITY)
}

/// Spawn a named forwarding thread that receives events from a std::sync::mpsc channel
/// and forwards them to the session.
pub fn spawn_forwarding_thread<T: Send + 'static>(
    name: &str,
    receiver: std::sync::mpsc::Receiver<T>,
    sender: mpsc::Sender<SessionEvent>,
    map_fn: impl Fn(T) -> SessionEvent + Send + 'static,
) -> Result<std::thread::JoinHandle<()>> {
    let thread_name = name.to_string();
    std::thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            while let Ok(event) = receiver.recv() {
                if sender.blocking_send(map_fn(event)).is_err() {
                    break; // Session has stopped
                }
            }
        })
        .map_err(|e| anyhow!("Failed to spawn {} thread: {}", thread_name, e))
}

/// Grid item number `n` of a generated load.
fn generated_item(n: usize, columns: usize) -> ItemSpec {
    let col = i32::try_from(n % columns).unwrap_or(i32::MAX);
    let row = i32::try_from(n / columns).unwrap_or(i32::MAX);
    ItemSpec::cell(col, row).with_label(format!("item {}", n))
}

/// Produce `count` grid items starting at item number `first`, in batches.
fn spawn_loader(
    first: usize,
    count: usize,
    columns: usize,
    batch_size: usize,
    sender: std::sync::mpsc::Sender<Vec<ItemSpec>>,
) -> Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("vcanvas-loader".to_string())
        .spawn(move || {
            let mut batch = Vec::with_capacity(batch_size);
            for n in first..first + count {
                batch.push(generated_item(n, columns));
                if batch.len() == batch_size && sender.send(std::mem::take(&mut batch)).is_err() {
                    return;
                }
            }
            if !batch.is_empty() {
                let _ = sender.send(batch);
            }
        })
        .map_err(|e| anyhow!("Failed to spawn loader thread: {}", e))
}

/// Owner of one canvas and its background work.
pub struct Session {
    canvas: Canvas,
    sender: mpsc::Sender<SessionEvent>,
    debouncer: Debouncer,
    quiet_timer: Option<JoinHandle<()>>,
    batch_size: usize,
    /// Items requested from the loader and not yet delivered.
    loading: usize,
    next_generated: usize,
    /// The session holds a suppression scope until loaded items are laid out.
    load_suppressed: bool,
    idle_waiters: Vec<oneshot::Sender<CanvasResponse>>,
    threads: Vec<std::thread::JoinHandle<()>>,
}

impl Session {
    pub fn new(config: &Config, sender: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            canvas: VirtualCanvas::new(
                config.canvas_config(),
                MemorySurface::new(),
                RecordingPainter::new(),
            ),
            sender,
            debouncer: Debouncer::new(config.layout_debounce()),
            quiet_timer: None,
            batch_size: config.behavior.loader_batch_size.max(1),
            loading: 0,
            next_generated: 0,
            load_suppressed: false,
            idle_waiters: Vec::new(),
            threads: Vec::new(),
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// No load in flight and no deferred layout pending.
    pub fn is_idle(&self) -> bool {
        self.loading == 0 && !self.debouncer.is_pending() && !self.load_suppressed
    }

    pub fn state(&mut self) -> SessionState {
        self.canvas.ensure_layout();
        let c = &self.canvas;
        SessionState {
            attached: c.is_attached(),
            suppressed: c.is_suppressed(),
            client: c.client_size(),
            item_area: c.item_area(),
            offset: c.offset(),
            content: c.content_size(),
            horizontal: c.scrollbar_state(Axis::Horizontal),
            vertical: c.scrollbar_state(Axis::Vertical),
            items: c.registry().len(),
            hovered: c.hovered(),
            selected: c.selection().to_vec(),
            loading: self.loading,
            stats: PaintStats::new(c.stats(), c.layout_passes(), c.surface().counters()),
        }
    }

    /// Execute one command and build its response.
    pub fn handle_command(&mut self, cmd: CanvasCommand) -> CanvasResponse {
        match self.execute(cmd) {
            Ok(response) => response,
            Err(e) => {
                debug!("Command failed: {}", e);
                CanvasResponse::error(e.to_string())
            }
        }
    }

    fn execute(&mut self, cmd: CanvasCommand) -> Result<CanvasResponse> {
        let c = &mut self.canvas;
        let response = match cmd {
            CanvasCommand::Attach => {
                c.attach()?;
                CanvasResponse::Ok
            }
            CanvasCommand::Detach => {
                c.detach();
                CanvasResponse::Ok
            }
            CanvasCommand::Resize { width, height } => {
                let negotiation = c.resize(Size::new(width, height))?;
                debug!(?negotiation, "Resized to {}x{}", width, height);
                CanvasResponse::Ok
            }
            CanvasCommand::SetExtent { axis, extent } => {
                c.set_extent_mode(axis, extent)?;
                CanvasResponse::Ok
            }

            CanvasCommand::AddItem { item } => CanvasResponse::ItemAdded {
                id: c.add_item(item)?,
            },
            CanvasCommand::AddItems { items } => {
                let ids = c.batch_update(|c| {
                    items
                        .into_iter()
                        .map(|item| c.add_item(item))
                        .collect::<Result<Vec<_>, _>>()
                })??;
                CanvasResponse::ItemsAdded { ids }
            }
            CanvasCommand::UpdateItem { id, item } => {
                c.modify_item(id, |slot| *slot = item)?;
                CanvasResponse::Ok
            }
            CanvasCommand::RemoveItem { id } => {
                c.remove_item(id)?;
                CanvasResponse::Ok
            }
            CanvasCommand::ClearItems => {
                let removed = c.clear_items()?;
                debug!("Cleared {} items", removed.len());
                CanvasResponse::Ok
            }
            CanvasCommand::BringToFront { id } => {
                c.bring_to_front(id)?;
                CanvasResponse::Ok
            }
            CanvasCommand::SendToBack { id } => {
                c.send_to_back(id)?;
                CanvasResponse::Ok
            }
            CanvasCommand::LoadItems { count, columns } => {
                self.start_load(count, columns)?;
                CanvasResponse::Loading { requested: count }
            }

            CanvasCommand::SetOffset { axis, offset } => {
                let changed = c.set_offset(axis, offset)?;
                self.scrolled(changed)
            }
            CanvasCommand::ScrollBy { axis, delta } => {
                let changed = c.scroll_by(axis, delta)?;
                self.scrolled(changed)
            }
            CanvasCommand::ScrollLines { axis, lines } => {
                let changed = c.scroll_lines(axis, lines)?;
                self.scrolled(changed)
            }
            CanvasCommand::ScrollPages { axis, pages } => {
                let changed = c.scroll_pages(axis, pages)?;
                self.scrolled(changed)
            }
            CanvasCommand::ScrollIntoView { id } => {
                let changed = c.scroll_into_view(id)?;
                self.scrolled(changed)
            }
            CanvasCommand::Wheel { delta, modifiers } => {
                let changed = c.wheel(delta, modifiers)?;
                self.scrolled(changed)
            }
            CanvasCommand::ScrollbarValue { axis, value } => {
                let changed = c.on_scrollbar_value_changed(axis, value)?;
                self.scrolled(changed)
            }

            CanvasCommand::MouseMove { x, y } => {
                CanvasResponse::events(&c.mouse_move(Point::new(x, y))?)
            }
            CanvasCommand::MouseDown {
                x,
                y,
                buttons,
                modifiers,
            } => CanvasResponse::events(&c.mouse_down(
                Point::new(x, y),
                buttons,
                modifiers,
                Instant::now(),
            )?),
            CanvasCommand::MouseUp { x, y, modifiers } => {
                CanvasResponse::events(&c.mouse_up(Point::new(x, y), modifiers)?)
            }
            CanvasCommand::MouseLeave => CanvasResponse::events(&c.mouse_leave()?),
            CanvasCommand::DragEnter => {
                c.drag_enter();
                CanvasResponse::Ok
            }
            CanvasCommand::DragLeave => {
                c.drag_leave();
                CanvasResponse::Ok
            }

            CanvasCommand::SelectOnly { id } => {
                c.select_only(id)?;
                CanvasResponse::events(&c.take_events())
            }
            CanvasCommand::ClearSelection => {
                c.clear_selection()?;
                CanvasResponse::events(&c.take_events())
            }

            CanvasCommand::Redraw => CanvasResponse::Redraw {
                outcome: c.request_redraw()?.into(),
            },
            CanvasCommand::SuppressPush => {
                c.suppress_push();
                CanvasResponse::Ok
            }
            CanvasCommand::SuppressPop => {
                c.suppress_pop()?;
                CanvasResponse::Ok
            }
            CanvasCommand::ForceClear => {
                self.load_suppressed = false;
                CanvasResponse::Redraw {
                    outcome: self.canvas.force_clear()?.into(),
                }
            }
            CanvasCommand::PresentLastFrame => {
                c.present_last_frame()?;
                CanvasResponse::Ok
            }

            CanvasCommand::HitTest { x, y } => CanvasResponse::Hit {
                id: c.hit_test(Point::new(x, y)),
            },
            CanvasCommand::QueryState | CanvasCommand::WaitIdle => {
                CanvasResponse::State(self.state())
            }
            CanvasCommand::QueryFrame => CanvasResponse::Frame {
                frame: c.surface().presented().cloned(),
            },
            CanvasCommand::Stop => CanvasResponse::Ok,
        };
        Ok(response)
    }

    fn scrolled(&self, changed: bool) -> CanvasResponse {
        CanvasResponse::Scrolled {
            changed,
            offset: self.canvas.offset(),
        }
    }

    fn start_load(&mut self, count: usize, columns: i32) -> Result<()> {
        let columns = usize::try_from(columns)
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| anyhow!("columns must be at least 1, got {}", columns))?;
        if count == 0 {
            return Ok(());
        }

        let first = self.next_generated;
        let (tx, rx) = std::sync::mpsc::channel();
        self.threads
            .push(spawn_loader(first, count, columns, self.batch_size, tx)?);
        self.threads.push(spawn_forwarding_thread(
            "loader-fwd",
            rx,
            self.sender.clone(),
            SessionEvent::LoaderBatch,
        )?);

        self.next_generated += count;
        self.loading += count;
        info!("Loading {} items in batches of {}", count, self.batch_size);
        self.defer_layout();
        Ok(())
    }

    fn on_loader_batch(&mut self, items: Vec<ItemSpec>) {
        let delivered = items.len();
        self.defer_layout();
        for item in items {
            if let Err(e) = self.canvas.add_item(item) {
                warn!("Failed to add loaded item: {}", e);
            }
        }
        self.loading = self.loading.saturating_sub(delivered);
        debug!(delivered, remaining = self.loading, "Loader batch applied");
    }

    /// Hold redraws until the quiet period after the latest activity.
    fn defer_layout(&mut self) {
        if !self.load_suppressed {
            self.canvas.suppress_push();
            self.load_suppressed = true;
        }
        self.debouncer.poke(Instant::now());
        self.restart_quiet_timer(self.debouncer.quiet_period());
    }

    fn restart_quiet_timer(&mut self, delay: std::time::Duration) {
        if let Some(handle) = self.quiet_timer.take() {
            handle.abort();
        }
        let tx = self.sender.clone();
        self.quiet_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SessionEvent::LayoutQuiet).await;
        }));
    }

    fn on_layout_quiet(&mut self) {
        let now = Instant::now();
        if !self.debouncer.poll(now) {
            if let Some(deadline) = self.debouncer.deadline() {
                self.restart_quiet_timer(deadline.saturating_duration_since(now));
            }
            return;
        }
        self.quiet_timer = None;

        let laid_out = self.canvas.ensure_layout();
        if self.load_suppressed {
            self.load_suppressed = false;
            if let Err(e) = self.canvas.suppress_pop() {
                warn!("Failed to paint after layout: {}", e);
            }
        }
        debug!(laid_out, items = self.canvas.registry().len(), "Layout settled");
        self.notify_idle();
    }

    fn notify_idle(&mut self) {
        if !self.is_idle() || self.idle_waiters.is_empty() {
            return;
        }
        let state = self.state();
        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(CanvasResponse::State(state.clone()));
        }
    }

    /// Process one event. Returns `false` when the session should stop.
    pub fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Command {
                cmd: CanvasCommand::WaitIdle,
                responder,
            } => {
                self.idle_waiters.push(responder);
                self.notify_idle();
            }
            SessionEvent::Command { cmd, responder } => {
                let is_stop = matches!(cmd, CanvasCommand::Stop);
                let response = self.handle_command(cmd);
                if responder.send(response).is_err() {
                    debug!("Client disconnected before receiving response");
                }
                if is_stop {
                    info!("Stop requested");
                    return false;
                }
            }
            SessionEvent::LoaderBatch(items) => self.on_loader_batch(items),
            SessionEvent::LayoutQuiet => self.on_layout_quiet(),
            SessionEvent::Shutdown => {
                info!("Shutdown signal received");
                return false;
            }
        }
        true
    }

    /// Run the session loop until stopped.
    pub async fn run(mut self, mut receiver: mpsc::Receiver<SessionEvent>) {
        info!("Session ready");
        while let Some(event) = receiver.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }

        if let Some(handle) = self.quiet_timer.take() {
            handle.abort();
        }
        // Close the channel first so forwarding threads blocked on a full
        // channel can observe it and exit.
        drop(receiver);
        debug!("Waiting for {} background threads to exit", self.threads.len());
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
        info!("Session stopped");
    }
}

/// Client side of a session channel.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn new(sender: mpsc::Sender<SessionEvent>) -> Self {
        Self { sender }
    }

    /// Send a command and wait for its response.
    pub async fn request(&self, cmd: CanvasCommand) -> Result<CanvasResponse> {
        let (responder, response) = oneshot::channel();
        self.sender
            .send(SessionEvent::Command { cmd, responder })
            .await
            .map_err(|_| anyhow!("Session has stopped"))?;
        response.await.context("Session dropped the request")
    }

    /// Like [`request`](Self::request), for plain threads outside the runtime.
    pub fn blocking_request(&self, cmd: CanvasCommand) -> Result<CanvasResponse> {
        let (responder, response) = oneshot::channel();
        self.sender
            .blocking_send(SessionEvent::Command { cmd, responder })
            .map_err(|_| anyhow!("Session has stopped"))?;
        response
            .blocking_recv()
            .context("Session dropped the request")
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(SessionEvent::Shutdown).await;
    }

    pub fn blocking_shutdown(&self) {
        let _ = self.sender.blocking_send(SessionEvent::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use vcanvas_core::ItemId;
    use vcanvas_protocol::CanvasEvent;

    fn session() -> Session {
        let (tx, _rx) = channel();
        let mut session = Session::new(&Config::default(), tx);
        session.handle_command(CanvasCommand::Attach);
        session.handle_command(CanvasCommand::Resize {
            width: 400,
            height: 300,
        });
        session
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.behavior.layout_debounce_ms = 5;
        config.behavior.loader_batch_size = 16;
        config
    }

    async fn with_session<F, Fut, R>(config: Config, client: F) -> R
    where
        F: FnOnce(SessionHandle) -> Fut,
        Fut: Future<Output = R>,
    {
        let (tx, rx) = channel();
        let session = Session::new(&config, tx.clone());
        let handle = SessionHandle::new(tx);
        let stopper = handle.clone();
        let (_, out) = tokio::join!(session.run(rx), async move {
            let out = client(handle).await;
            stopper.shutdown().await;
            out
        });
        out
    }

    #[test]
    fn test_add_item_and_hover() {
        let mut s = session();
        let id = match s.handle_command(CanvasCommand::AddItem {
            item: ItemSpec::cell(0, 0),
        }) {
            CanvasResponse::ItemAdded { id } => id,
            other => panic!("unexpected response: {:?}", other),
        };

        let resp = s.handle_command(CanvasCommand::MouseMove { x: 20, y: 20 });
        assert_eq!(
            resp,
            CanvasResponse::Events {
                events: vec![CanvasEvent::ItemEnter { id }]
            }
        );
        assert_eq!(s.state().hovered, Some(id));
    }

    #[test]
    fn test_errors_become_error_responses() {
        let mut s = session();
        let resp = s.handle_command(CanvasCommand::RemoveItem { id: ItemId(99) });
        match resp {
            CanvasResponse::Error { message } => assert!(message.contains("not found")),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_select_only_reports_selection() {
        let mut s = session();
        let ids = match s.handle_command(CanvasCommand::AddItems {
            items: vec![ItemSpec::cell(0, 0), ItemSpec::cell(1, 0)],
        }) {
            CanvasResponse::ItemsAdded { ids } => ids,
            other => panic!("unexpected response: {:?}", other),
        };

        let resp = s.handle_command(CanvasCommand::SelectOnly { id: ids[1] });
        assert_eq!(
            resp,
            CanvasResponse::Events {
                events: vec![CanvasEvent::SelectionChanged {
                    selected: vec![ids[1]]
                }]
            }
        );
    }

    #[test]
    fn test_scroll_reports_clamped_offset() {
        let mut s = session();
        s.handle_command(CanvasCommand::AddItems {
            items: (0..30).map(|row| ItemSpec::cell(0, row)).collect(),
        });
        let resp = s.handle_command(CanvasCommand::SetOffset {
            axis: Axis::Vertical,
            offset: 1_000_000,
        });
        let state = s.state();
        let max = state.content.unwrap().height - state.client.height;
        assert_eq!(
            resp,
            CanvasResponse::Scrolled {
                changed: true,
                offset: Point::new(0, max)
            }
        );
    }

    #[test]
    fn test_load_rejects_zero_columns() {
        let mut s = session();
        let resp = s.handle_command(CanvasCommand::LoadItems {
            count: 5,
            columns: 0,
        });
        assert!(matches!(resp, CanvasResponse::Error { .. }));
        assert!(s.is_idle());
    }

    #[test]
    fn test_generated_items_fill_rows() {
        assert_eq!(generated_item(0, 10).address, ItemSpec::cell(0, 0).address);
        assert_eq!(generated_item(23, 10).address, ItemSpec::cell(3, 2).address);
        assert_eq!(generated_item(23, 10).label.as_deref(), Some("item 23"));
    }

    #[tokio::test]
    async fn test_background_load_settles() {
        let state = with_session(fast_config(), |h| async move {
            h.request(CanvasCommand::Attach).await.unwrap();
            h.request(CanvasCommand::Resize {
                width: 400,
                height: 300,
            })
            .await
            .unwrap();
            let resp = h
                .request(CanvasCommand::LoadItems {
                    count: 100,
                    columns: 10,
                })
                .await
                .unwrap();
            assert_eq!(resp, CanvasResponse::Loading { requested: 100 });
            h.request(CanvasCommand::WaitIdle).await.unwrap()
        })
        .await;

        let CanvasResponse::State(state) = state else {
            panic!("unexpected response: {:?}", state);
        };
        assert_eq!(state.items, 100);
        assert_eq!(state.loading, 0);
        assert!(!state.suppressed);
        assert_eq!(state.content, Some(Size::new(1048, 728)));
        assert!(state.horizontal.visible);
        assert!(state.vertical.visible);
        assert!(state.stats.surface.blits >= 1);
    }

    #[tokio::test]
    async fn test_loaded_items_are_presented() {
        let frame = with_session(fast_config(), |h| async move {
            h.request(CanvasCommand::Attach).await.unwrap();
            h.request(CanvasCommand::Resize {
                width: 400,
                height: 300,
            })
            .await
            .unwrap();
            h.request(CanvasCommand::LoadItems {
                count: 40,
                columns: 4,
            })
            .await
            .unwrap();
            h.request(CanvasCommand::WaitIdle).await.unwrap();
            h.request(CanvasCommand::QueryFrame).await.unwrap()
        })
        .await;

        let CanvasResponse::Frame { frame: Some(frame) } = frame else {
            panic!("no frame presented: {:?}", frame);
        };
        assert!(!frame.items.is_empty());
    }

    #[tokio::test]
    async fn test_wait_idle_without_load_responds_immediately() {
        let resp = with_session(Config::default(), |h| async move {
            h.request(CanvasCommand::WaitIdle).await.unwrap()
        })
        .await;
        assert!(matches!(resp, CanvasResponse::State(s) if s.items == 0));
    }

    #[tokio::test]
    async fn test_stop_ends_session() {
        let after = with_session(Config::default(), |h| async move {
            assert_eq!(h.request(CanvasCommand::Stop).await.unwrap(), CanvasResponse::Ok);
            h.request(CanvasCommand::QueryState).await
        })
        .await;
        assert!(after.is_err());
    }
}
