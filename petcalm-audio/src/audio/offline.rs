//! Offline audio host
//!
//! Renders every running context on demand instead of on a device clock.
//! Used for tests and for bouncing a mix to a buffer. Every context
//! transition is appended to a lifecycle log so callers can check ordering
//! (a slot's old context must close before its replacement opens). The log
//! keeps the most recent `LIFECYCLE_LOG_CAPACITY` transitions.

use super::output::{AudioHost, RenderContext, RenderFn};
use super::types::AudioFrame;
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

pub const LIFECYCLE_LOG_CAPACITY: usize = 4096;

/// Context transition recorded by the offline host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleKind {
    Opened,
    Started,
    Suspended,
    Resumed,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub context_id: Uuid,
    pub label: String,
    pub kind: LifecycleKind,
}

struct ContextEntry {
    id: Uuid,
    label: String,
    render: Option<RenderFn>,
    running: bool,
    closed: bool,
}

#[derive(Default)]
struct Registry {
    contexts: Vec<ContextEntry>,
    log: VecDeque<LifecycleEvent>,
    refuse_suspend: bool,
}

impl Registry {
    fn record(&mut self, id: Uuid, kind: LifecycleKind) {
        if let Some(entry) = self.contexts.iter().find(|c| c.id == id) {
            debug!("offline context {} {:?}", entry.label, kind);
            if self.log.len() == LIFECYCLE_LOG_CAPACITY {
                self.log.pop_front();
            }
            self.log.push_back(LifecycleEvent {
                context_id: id,
                label: entry.label.clone(),
                kind,
            });
        }
    }

    fn entry_mut(&mut self, id: Uuid) -> Option<&mut ContextEntry> {
        self.contexts.iter_mut().find(|c| c.id == id)
    }
}

/// Host that renders on demand
#[derive(Clone)]
pub struct OfflineHost {
    registry: Arc<Mutex<Registry>>,
    sample_rate: u32,
    generation_supported: bool,
}

impl OfflineHost {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            sample_rate,
            generation_supported: true,
        }
    }

    /// Host on which procedural synthesis is unavailable
    pub fn without_generation(sample_rate: u32) -> Self {
        Self {
            generation_supported: false,
            ..Self::new(sample_rate)
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Recorded lifecycle transitions, oldest first
    pub fn lifecycle(&self) -> Vec<LifecycleEvent> {
        self.lock().log.iter().cloned().collect()
    }

    pub fn clear_lifecycle(&self) {
        self.lock().log.clear();
    }

    /// Make `suspend()` fail on every context, as a device that refuses to pause
    pub fn refuse_suspend(&self, refuse: bool) {
        self.lock().refuse_suspend = refuse;
    }

    /// Labels of contexts currently producing audio
    pub fn running_labels(&self) -> Vec<String> {
        self.lock()
            .contexts
            .iter()
            .filter(|c| c.running && !c.closed)
            .map(|c| c.label.clone())
            .collect()
    }

    pub fn running_count(&self) -> usize {
        self.lock()
            .contexts
            .iter()
            .filter(|c| c.running && !c.closed)
            .count()
    }

    /// Contexts opened and not yet closed (running or suspended)
    pub fn open_count(&self) -> usize {
        self.lock().contexts.iter().filter(|c| !c.closed).count()
    }

    /// Render `frames` frames of the summed output of all running contexts
    pub fn render(&self, frames: usize) -> Vec<AudioFrame> {
        let mut mix = vec![AudioFrame::zero(); frames];
        let mut block = vec![AudioFrame::zero(); frames];
        let mut registry = self.lock();

        for entry in registry.contexts.iter_mut() {
            if !entry.running || entry.closed {
                continue;
            }
            if let Some(render) = entry.render.as_mut() {
                block.fill(AudioFrame::zero());
                render(&mut block);
                for (out, frame) in mix.iter_mut().zip(block.iter()) {
                    out.left += frame.left;
                    out.right += frame.right;
                }
            }
        }

        for frame in mix.iter_mut() {
            frame.clamp();
        }
        mix
    }

    /// Render only the running context with the given label
    pub fn render_label(&self, label: &str, frames: usize) -> Option<Vec<AudioFrame>> {
        let mut registry = self.lock();
        let entry = registry
            .contexts
            .iter_mut()
            .find(|c| c.label == label && c.running && !c.closed)?;
        let render = entry.render.as_mut()?;

        let mut block = vec![AudioFrame::zero(); frames];
        render(&mut block);
        Some(block)
    }
}

impl AudioHost for OfflineHost {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn supports_generation(&self) -> bool {
        self.generation_supported
    }

    fn open(&self, label: &str) -> Result<Box<dyn RenderContext>> {
        let id = Uuid::new_v4();
        {
            let mut registry = self.lock();
            registry.contexts.push(ContextEntry {
                id,
                label: label.to_string(),
                render: None,
                running: false,
                closed: false,
            });
            registry.record(id, LifecycleKind::Opened);
        }

        Ok(Box::new(OfflineContext {
            id,
            label: label.to_string(),
            sample_rate: self.sample_rate,
            host: self.clone(),
            closed: false,
        }))
    }
}

struct OfflineContext {
    id: Uuid,
    label: String,
    sample_rate: u32,
    host: OfflineHost,
    closed: bool,
}

impl OfflineContext {
    fn closed_error(&self) -> Error {
        Error::AudioOutput(format!("{}: context already closed", self.label))
    }
}

impl RenderContext for OfflineContext {
    fn id(&self) -> Uuid {
        self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self, render: RenderFn) -> Result<()> {
        if self.closed {
            return Err(self.closed_error());
        }
        let mut registry = self.host.lock();
        let entry = registry
            .entry_mut(self.id)
            .ok_or_else(|| Error::AudioOutput(format!("{}: unknown context", self.label)))?;
        if entry.render.is_some() {
            return Err(Error::AudioOutput(format!("{}: already started", self.label)));
        }
        entry.render = Some(render);
        entry.running = true;
        registry.record(self.id, LifecycleKind::Started);
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        if self.closed {
            return Err(self.closed_error());
        }
        let mut registry = self.host.lock();
        if registry.refuse_suspend {
            return Err(Error::AudioOutput(format!("{}: suspend refused", self.label)));
        }
        if let Some(entry) = registry.entry_mut(self.id) {
            if entry.running {
                entry.running = false;
                registry.record(self.id, LifecycleKind::Suspended);
            }
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if self.closed {
            return Err(self.closed_error());
        }
        let mut registry = self.host.lock();
        if let Some(entry) = registry.entry_mut(self.id) {
            if !entry.running && entry.render.is_some() {
                entry.running = true;
                registry.record(self.id, LifecycleKind::Resumed);
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut registry = self.host.lock();
        if let Some(entry) = registry.entry_mut(self.id) {
            entry.closed = true;
            entry.running = false;
            entry.render = None;
        }
        registry.record(self.id, LifecycleKind::Closed);
        registry.contexts.retain(|c| c.id != self.id);
    }

    fn is_running(&self) -> bool {
        if self.closed {
            return false;
        }
        self.host
            .lock()
            .contexts
            .iter()
            .any(|c| c.id == self.id && c.running)
    }
}

impl Drop for OfflineContext {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: f32) -> RenderFn {
        Box::new(move |frames: &mut [AudioFrame]| {
            for frame in frames.iter_mut() {
                *frame = AudioFrame::from_mono(value);
            }
        })
    }

    #[test]
    fn test_lifecycle_is_recorded_in_order() {
        let host = OfflineHost::new(8000);
        let mut ctx = host.open("primary:9").unwrap();
        ctx.start(constant(0.1)).unwrap();
        ctx.suspend().unwrap();
        ctx.suspend().unwrap(); // no duplicate entry
        ctx.resume().unwrap();
        ctx.close();
        ctx.close();

        let kinds: Vec<LifecycleKind> = host.lifecycle().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LifecycleKind::Opened,
                LifecycleKind::Started,
                LifecycleKind::Suspended,
                LifecycleKind::Resumed,
                LifecycleKind::Closed,
            ]
        );
        assert_eq!(host.open_count(), 0);
    }

    #[test]
    fn test_render_sums_running_contexts() {
        let host = OfflineHost::new(8000);
        let mut a = host.open("a").unwrap();
        let mut b = host.open("b").unwrap();
        a.start(constant(0.25)).unwrap();
        b.start(constant(0.5)).unwrap();

        let mixed = host.render(4);
        assert!(mixed.iter().all(|f| (f.left - 0.75).abs() < 1e-6));

        b.suspend().unwrap();
        assert!(!b.is_running());
        let mixed = host.render(4);
        assert!(mixed.iter().all(|f| (f.left - 0.25).abs() < 1e-6));
        assert_eq!(host.running_labels(), vec!["a".to_string()]);

        assert_eq!(host.render_label("a", 2).unwrap().len(), 2);
        assert!(host.render_label("b", 2).is_none());
    }

    #[test]
    fn test_render_clamps_sum() {
        let host = OfflineHost::new(8000);
        let mut a = host.open("a").unwrap();
        let mut b = host.open("b").unwrap();
        a.start(constant(0.8)).unwrap();
        b.start(constant(0.8)).unwrap();
        assert!(host.render(8).iter().all(|f| f.left == 1.0));
    }

    #[test]
    fn test_drop_closes_context() {
        let host = OfflineHost::new(8000);
        {
            let mut ctx = host.open("dropped").unwrap();
            ctx.start(constant(0.1)).unwrap();
            assert_eq!(host.running_count(), 1);
        }
        assert_eq!(host.running_count(), 0);
        assert_eq!(
            host.lifecycle().last().map(|e| e.kind),
            Some(LifecycleKind::Closed)
        );
    }

    #[test]
    fn test_lifecycle_log_is_bounded_and_clearable() {
        let host = OfflineHost::new(8000);
        for _ in 0..LIFECYCLE_LOG_CAPACITY {
            let mut ctx = host.open("bounce").unwrap();
            ctx.close();
        }
        let log = host.lifecycle();
        assert_eq!(log.len(), LIFECYCLE_LOG_CAPACITY);
        // Oldest entries dropped: the log still ends on a close
        assert_eq!(log.first().map(|e| e.kind), Some(LifecycleKind::Opened));
        assert_eq!(log.last().map(|e| e.kind), Some(LifecycleKind::Closed));

        host.clear_lifecycle();
        assert!(host.lifecycle().is_empty());
    }

    #[test]
    fn test_refused_suspend_keeps_running() {
        let host = OfflineHost::new(8000);
        let mut ctx = host.open("stubborn").unwrap();
        ctx.start(constant(0.2)).unwrap();

        host.refuse_suspend(true);
        assert!(ctx.suspend().is_err());
        assert!(ctx.is_running());

        host.refuse_suspend(false);
        ctx.suspend().unwrap();
        assert!(!ctx.is_running());
    }

    #[test]
    fn test_closed_context_rejects_controls() {
        let host = OfflineHost::new(8000);
        let mut ctx = host.open("x").unwrap();
        ctx.close();
        assert!(ctx.start(constant(0.0)).is_err());
        assert!(ctx.suspend().is_err());
        assert!(host.supports_generation());
        assert!(!OfflineHost::without_generation(8000).supports_generation());
    }
}
