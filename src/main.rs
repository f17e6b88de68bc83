//! wavescope entrypoint: terminal spectrum visualizer, streaming client, and
//! SSE relay behind one CLI.

use anyhow::{anyhow, Context, Result};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use wavescope::audio::{AnalysisUpdate, CaptureSession};
use wavescope::config::AppConfig;
use wavescope::relay;
use wavescope::stream::StreamSession;
use wavescope::{init_logging, init_tracing, log_debug, log_panic};

/// Glyph ramp for one band, quietest to loudest.
const BAR_GLYPHS: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    init_logging(&config);
    init_tracing(&config);

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log_panic(info);
        default_hook(info);
    }));

    if config.list_input_devices {
        return list_input_devices();
    }
    if config.relay {
        log_debug(&format!(
            "starting relay on {} -> {}",
            config.relay_addr, config.backend_url
        ));
        return relay::serve(&config.relay_addr, &config.backend_url)
            .map_err(|err| anyhow!("{err}"));
    }

    run_visualizer(&config)
}

fn list_input_devices() -> Result<()> {
    let devices = CaptureSession::list_devices().map_err(|err| anyhow!("{err}"))?;
    if devices.is_empty() {
        println!("No audio input devices detected.");
        return Ok(());
    }
    println!("Audio input devices:");
    for name in devices {
        println!("  {name}");
    }
    Ok(())
}

/// Capture for `--seconds`, rendering the band spectrum on one terminal line.
/// With `--stream-url` the capture is simultaneously streamed for
/// transcription and the transcript is printed at the end.
fn run_visualizer(config: &AppConfig) -> Result<()> {
    let mut capture = CaptureSession::open(config.input_device.as_deref(), config.fft_size)
        .map_err(|err| anyhow!("{err}"))?;
    eprintln!(
        "Capturing from '{}' at {} Hz for {}s (ctrl-c to abort)",
        capture.device_name(),
        capture.sample_rate(),
        config.seconds
    );

    let latest: Arc<Mutex<Option<AnalysisUpdate>>> = Arc::new(Mutex::new(None));
    let sink = latest.clone();
    capture
        .subscribe(&config.analysis_settings(), move |update| {
            if let Ok(mut slot) = sink.lock() {
                *slot = Some(update);
            }
        })
        .map_err(|err| anyhow!("{err}"))?;

    let stop = Arc::new(AtomicBool::new(false));
    let mut stream_worker = None;
    // The tap must outlive the worker; its stream lives on this thread while
    // the receiver crosses into the session thread.
    let mut tap = None;

    let streaming = config.stream_settings();
    if let Some(url) = &streaming.url {
        let opened = capture
            .open_tap(streaming.chunk_samples, streaming.channel_capacity)
            .map_err(|err| anyhow!("{err}"))?;
        let frames = opened.frames();
        let source_rate = opened.sample_rate();
        tap = Some(opened);

        // Dial on this thread so a refused backend fails before any capture
        // runs; the open session then moves to its own worker.
        let mut session =
            StreamSession::start(&capture, url).map_err(|err| anyhow!("{err}"))?;
        let stop_flag = stop.clone();
        stream_worker = Some(thread::spawn(move || -> Result<StreamSession> {
            session
                .forward_chunks(&frames, source_rate, &stop_flag)
                .map_err(|err| anyhow!("{err}"))?;
            Ok(session)
        }));
    }

    let deadline = Instant::now() + Duration::from_secs(config.seconds);
    let mut out = io::stdout();
    while Instant::now() < deadline {
        if let Ok(slot) = latest.lock() {
            if let Some(update) = slot.as_ref() {
                let line = render_bands(&update.bands);
                let marker = if update.is_silent { " (silent)" } else { "" };
                let _ = write!(out, "\r[{line}]{marker}   ");
                let _ = out.flush();
            }
        }
        thread::sleep(Duration::from_millis(config.poll_interval_ms.max(1)));
    }
    let _ = writeln!(out);

    stop.store(true, Ordering::Relaxed);
    capture.unsubscribe();

    if let Some(worker) = stream_worker {
        let mut session = worker
            .join()
            .map_err(|_| anyhow!("streaming worker panicked"))?
            .context("streaming session failed")?;

        println!(
            "Sent {} chunks ({} dropped on the session, {} at capture)",
            session.chunks_sent(),
            session.chunks_dropped(),
            tap.as_ref().map(|t| t.dropped_chunks()).unwrap_or(0)
        );
        let transcript = session.transcript();
        if !transcript.partial().is_empty() {
            println!("(unfinished) {}", transcript.partial());
        }
        if transcript.committed().is_empty() {
            println!("No transcript received.");
        } else {
            println!("Transcript:\n{}", transcript.render());
        }
        let unhandled = session.take_unhandled();
        if !unhandled.is_empty() {
            log_debug(&format!(
                "backend sent {} event(s) of types this client does not handle",
                unhandled.len()
            ));
        }
        if let Some(err) = session.last_error() {
            eprintln!("Backend reported: {err}");
        }
    }
    drop(tap);

    capture.stop();
    Ok(())
}

fn render_bands(bands: &[f32]) -> String {
    bands
        .iter()
        .map(|&level| {
            let idx = (level.clamp(0.0, 1.0) * (BAR_GLYPHS.len() - 1) as f32).round() as usize;
            BAR_GLYPHS[idx]
        })
        .collect()
}
