//! End-to-end capture runs against scripted collaborators

use chatsnap::block::NormalizedBlock;
use chatsnap::capture::{CancelToken, Capture, CaptureOutcome, NO_MESSAGES_NOTICE};
use chatsnap::platform::{
    DeliveryKind, DeviceMetrics, InteractionEvent, MemorySurface, ScriptedInteraction,
    ShareCapabilities,
};
use chatsnap::range::{RangeMode, RangeRequest};
use chatsnap::rendering::{Container, RasterBackend, RenderOptions};
use chatsnap::transcript::{MessageElement, Transcript};
use chatsnap::{Result, SnapConfig};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tiny_skia::Pixmap;

/// Reports a fixed height per block and paints a flat canvas.
struct FixedBackend {
    height: f32,
    rasterized: Mutex<Vec<Vec<u64>>>,
    cancel_after_first: Option<CancelToken>,
    measures: AtomicUsize,
}

impl FixedBackend {
    fn new(height: f32) -> Self {
        Self {
            height,
            rasterized: Mutex::new(Vec::new()),
            cancel_after_first: None,
            measures: AtomicUsize::new(0),
        }
    }

    fn cancelling(height: f32, token: CancelToken) -> Self {
        Self {
            cancel_after_first: Some(token),
            ..Self::new(height)
        }
    }

    fn segments(&self) -> Vec<Vec<u64>> {
        self.rasterized.lock().unwrap().clone()
    }
}

impl RasterBackend for FixedBackend {
    fn measure(&self, _container: &Container, _block: &NormalizedBlock) -> Result<f32> {
        self.measures.fetch_add(1, Ordering::SeqCst);
        Ok(self.height)
    }

    fn rasterize(&self, container: &Container, options: &RenderOptions) -> Result<Pixmap> {
        let ids: Vec<u64> = container.blocks().iter().map(|b| b.id).collect();
        let mut segments = self.rasterized.lock().unwrap();
        segments.push(ids);
        if segments.len() == 1 {
            if let Some(token) = &self.cancel_after_first {
                token.cancel();
            }
        }
        let mut pixmap = Pixmap::new(
            (container.outer_width() * options.scale) as u32,
            (10.0 * options.scale) as u32,
        )
        .unwrap();
        pixmap.fill(options.background.to_skia());
        Ok(pixmap)
    }
}

fn transcript(n: u64, name: &str) -> Transcript {
    Transcript::new(
        (0..n)
            .map(|i| {
                MessageElement::new(i, i % 2 == 1, format!("<p>line {}</p>", i)).with_name(name)
            })
            .collect(),
    )
}

async fn run(
    backend: &FixedBackend,
    ui: &ScriptedInteraction,
    surface: &MemorySurface,
    source: &Transcript,
    request: RangeRequest,
    cancel: &CancelToken,
) -> CaptureOutcome {
    let cfg = SnapConfig::default();
    Capture::new(&cfg, backend, ui, surface)
        .with_settle_delay(Duration::ZERO)
        .run(source, &request, cancel)
        .await
}

#[tokio::test]
async fn short_message_yields_one_image_without_prompt() {
    let backend = FixedBackend::new(500.0);
    let ui = ScriptedInteraction::answering(false);
    let surface = MemorySurface::new();
    let outcome = run(
        &backend,
        &ui,
        &surface,
        &transcript(4, "Seraphina"),
        RangeRequest::default(),
        &CancelToken::new(),
    )
    .await;

    assert!(outcome.is_saved(), "{:?}", outcome);
    assert!(ui.confirmations().is_empty());
    assert_eq!(backend.segments(), vec![vec![3]]);

    let deliveries = surface.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].name, "Seraphina.png");
    assert_eq!(deliveries[0].mime, "image/png");
    assert_eq!(&deliveries[0].bytes[..4], b"\x89PNG");
    assert_eq!(deliveries[0].kind, DeliveryKind::Downloaded);
}

#[tokio::test]
async fn tall_range_asks_then_writes_ordered_zip() {
    // 580 + 20 spacing per block: six fit under 4096, four spill over
    let backend = FixedBackend::new(580.0);
    let ui = ScriptedInteraction::answering(true);
    let surface = MemorySurface::new();
    let outcome = run(
        &backend,
        &ui,
        &surface,
        &transcript(10, "Seraphina"),
        RangeRequest::mode(RangeMode::All),
        &CancelToken::new(),
    )
    .await;

    match &outcome {
        CaptureOutcome::Saved(report) => {
            assert_eq!(report.artifact, "Seraphina.zip");
            assert_eq!(report.blocks, 10);
            assert_eq!(report.segments, 2);
        }
        other => panic!("unexpected {:?}", other),
    }
    let asked = ui.confirmations();
    assert_eq!(asked.len(), 1);
    assert!(asked[0].contains("4096"));
    assert!(asked[0].contains("2 images"));
    assert_eq!(
        backend.segments(),
        vec![vec![0, 1, 2, 3, 4, 5], vec![6, 7, 8, 9]]
    );

    let zip_bytes = surface.deliveries()[0].bytes.clone();
    let mut zip = zip::ZipArchive::new(Cursor::new(zip_bytes)).unwrap();
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(names, vec!["Seraphina-1.png", "Seraphina-2.png"]);
    let mut first = Vec::new();
    zip.by_name("Seraphina-1.png")
        .unwrap()
        .read_to_end(&mut first)
        .unwrap();
    assert_eq!(&first[..4], b"\x89PNG");
}

#[tokio::test]
async fn declining_the_split_stops_before_rendering() {
    let backend = FixedBackend::new(580.0);
    let ui = ScriptedInteraction::answering(false);
    let surface = MemorySurface::new();
    let outcome = run(
        &backend,
        &ui,
        &surface,
        &transcript(10, "Seraphina"),
        RangeRequest::mode(RangeMode::All),
        &CancelToken::new(),
    )
    .await;

    assert!(matches!(outcome, CaptureOutcome::Declined));
    assert_eq!(backend.measures.load(Ordering::SeqCst), 10);
    assert!(backend.segments().is_empty());
    assert!(surface.deliveries().is_empty());
    assert!(!ui.progress_visible());
}

#[tokio::test]
async fn inverted_range_reports_no_messages() {
    let backend = FixedBackend::new(100.0);
    let ui = ScriptedInteraction::answering(true);
    let surface = MemorySurface::new();
    let outcome = run(
        &backend,
        &ui,
        &surface,
        &transcript(10, "Seraphina"),
        RangeRequest::between(Some(8), Some(3)),
        &CancelToken::new(),
    )
    .await;

    assert!(matches!(outcome, CaptureOutcome::NoMessages));
    assert_eq!(
        ui.events(),
        vec![
            InteractionEvent::ProgressShown(chatsnap::capture::PROGRESS_MESSAGE.to_string()),
            InteractionEvent::Notice(NO_MESSAGES_NOTICE.to_string()),
            InteractionEvent::ProgressHidden,
        ]
    );
    assert_eq!(backend.measures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancel_between_segments_discards_everything() {
    let cancel = CancelToken::new();
    let backend = FixedBackend::cancelling(580.0, cancel.clone());
    let ui = ScriptedInteraction::answering(true);
    let surface = MemorySurface::new();
    let outcome = run(
        &backend,
        &ui,
        &surface,
        &transcript(10, "Seraphina"),
        RangeRequest::mode(RangeMode::All),
        &cancel,
    )
    .await;

    assert!(matches!(outcome, CaptureOutcome::Cancelled));
    assert_eq!(backend.segments().len(), 1);
    assert!(surface.deliveries().is_empty());
    assert!(ui.notices().is_empty());
    assert!(!ui.progress_visible());
}

#[tokio::test]
async fn shared_when_surface_accepts_png() {
    let backend = FixedBackend::new(200.0);
    let ui = ScriptedInteraction::answering(true);
    let surface = MemorySurface::with_share(ShareCapabilities::files(&["image/png"]));
    let outcome = run(
        &backend,
        &ui,
        &surface,
        &transcript(2, "Seraphina"),
        RangeRequest::mode(RangeMode::Last2),
        &CancelToken::new(),
    )
    .await;

    assert!(outcome.is_saved());
    assert_eq!(backend.segments(), vec![vec![0, 1]]);
    assert_eq!(surface.deliveries()[0].kind, DeliveryKind::Shared);
}

#[tokio::test]
async fn mobile_previews_and_renders_at_base_scale() {
    let backend = FixedBackend::new(200.0);
    let ui = ScriptedInteraction::answering(true);
    let surface = MemorySurface::new();
    let cfg = SnapConfig::default();
    let outcome = Capture::new(&cfg, &backend, &ui, &surface)
        .with_device(DeviceMetrics::mobile())
        .with_settle_delay(Duration::ZERO)
        .run(&transcript(1, "Seraphina"), &RangeRequest::default(), &CancelToken::new())
        .await;

    assert!(outcome.is_saved());
    let delivery = &surface.deliveries()[0];
    assert_eq!(delivery.kind, DeliveryKind::Previewed);
    let decoded = image::load_from_memory(&delivery.bytes).unwrap();
    // constrained devices rasterize at dpr 1: (400 + 2 * 20) * 2
    assert_eq!(decoded.width(), 880);
}

#[tokio::test]
async fn unnamed_chat_falls_back_to_default_file_name() {
    let backend = FixedBackend::new(100.0);
    let ui = ScriptedInteraction::answering(true);
    let surface = MemorySurface::new();
    let source = Transcript::new(vec![MessageElement::new(0, true, "<p>hi</p>")]);
    let outcome = run(
        &backend,
        &ui,
        &surface,
        &source,
        RangeRequest::default(),
        &CancelToken::new(),
    )
    .await;
    assert!(outcome.is_saved());
    assert_eq!(surface.deliveries()[0].name, "chat.png");
}
