//! Event sinks for tracing shuffle exchanges

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use gs_rust::{Event, EventSink, GsTime, PeerId};

// ============================================================================
// Console Logging Sink
// ============================================================================

/// Logging event sink that prints exchange events to the console
pub struct ConsoleEventSink {
    enabled: bool,
}

impl ConsoleEventSink {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl EventSink for ConsoleEventSink {
    fn log(&mut self, round: GsTime, peer: PeerId, event: Event) {
        if !self.enabled {
            return;
        }

        // Format: round peer_id event_type event_details
        let peer_fmt = format!("{:x}", peer & 0xFFFF);

        match event {
            Event::ShuffleStarted {
                partner,
                subset_len,
                partner_evicted,
            } => {
                println!(
                    "{:>5} {:>6} ShuffleStarted    partner:{:x} sent:{} evicted:{}",
                    round,
                    peer_fmt,
                    partner & 0xFFFF,
                    subset_len,
                    partner_evicted
                );
            }
            Event::RequestAnswered {
                requester,
                sent_len,
                merge,
            } => {
                println!(
                    "{:>5} {:>6} RequestAnswered   requester:{:x} sent:{} added:{} replaced:{} skipped:{} dropped:{}",
                    round,
                    peer_fmt,
                    requester & 0xFFFF,
                    sent_len,
                    merge.appended,
                    merge.replaced,
                    merge.skipped,
                    merge.dropped
                );
            }
            Event::RequestRefused { requester } => {
                println!(
                    "{:>5} {:>6} RequestRefused    requester:{:x}",
                    round,
                    peer_fmt,
                    requester & 0xFFFF
                );
            }
            Event::ExchangeCompleted { partner, merge } => {
                println!(
                    "{:>5} {:>6} ExchangeCompleted partner:{:x} added:{} replaced:{} skipped:{} dropped:{}",
                    round,
                    peer_fmt,
                    partner & 0xFFFF,
                    merge.appended,
                    merge.replaced,
                    merge.skipped,
                    merge.dropped
                );
            }
            Event::ExchangeRefused {
                partner,
                partner_restored,
            } => {
                println!(
                    "{:>5} {:>6} ExchangeRefused   partner:{:x} restored:{}",
                    round,
                    peer_fmt,
                    partner & 0xFFFF,
                    partner_restored
                );
            }
        }
    }
}

// ============================================================================
// CSV Event Sink
// ============================================================================

/// CSV event sink for structured data export
pub struct CsvEventSink {
    writer: BufWriter<File>,
}

impl CsvEventSink {
    pub fn new<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        // Write CSV header
        writeln!(
            writer,
            "round,peer,event_type,other_peer,subset_len,appended,replaced,skipped,dropped,details"
        )?;

        Ok(Self { writer })
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl EventSink for CsvEventSink {
    fn log(&mut self, round: GsTime, peer: PeerId, event: Event) {
        let result = match event {
            Event::ShuffleStarted {
                partner,
                subset_len,
                partner_evicted,
            } => writeln!(
                self.writer,
                "{},{},ShuffleStarted,{},{},0,0,0,0,evicted={}",
                round, peer, partner, subset_len, partner_evicted
            ),
            Event::RequestAnswered {
                requester,
                sent_len,
                merge,
            } => writeln!(
                self.writer,
                "{},{},RequestAnswered,{},{},{},{},{},{},",
                round,
                peer,
                requester,
                sent_len,
                merge.appended,
                merge.replaced,
                merge.skipped,
                merge.dropped
            ),
            Event::RequestRefused { requester } => writeln!(
                self.writer,
                "{},{},RequestRefused,{},0,0,0,0,0,",
                round, peer, requester
            ),
            Event::ExchangeCompleted { partner, merge } => writeln!(
                self.writer,
                "{},{},ExchangeCompleted,{},0,{},{},{},{},",
                round, peer, partner, merge.appended, merge.replaced, merge.skipped, merge.dropped
            ),
            Event::ExchangeRefused {
                partner,
                partner_restored,
            } => writeln!(
                self.writer,
                "{},{},ExchangeRefused,{},0,0,0,0,0,restored={}",
                round, peer, partner, partner_restored
            ),
        };

        if let Err(e) = result {
            eprintln!("Error writing to CSV: {}", e);
        }
    }
}

impl Drop for CsvEventSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

// ============================================================================
// Shared Sink (one sink, many nodes)
// ============================================================================

/// Hands several nodes a handle to a single underlying sink, so a whole
/// overlay can log into one CSV file. The simulation is single-threaded, so
/// plain Rc/RefCell sharing is enough.
pub struct SharedSink<S: EventSink> {
    inner: Rc<RefCell<S>>,
}

impl<S: EventSink> SharedSink<S> {
    pub fn new(inner: Rc<RefCell<S>>) -> Self {
        Self { inner }
    }
}

impl<S: EventSink> EventSink for SharedSink<S> {
    fn log(&mut self, round: GsTime, peer: PeerId, event: Event) {
        self.inner.borrow_mut().log(round, peer, event);
    }
}
