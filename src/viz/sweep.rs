use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::unbounded;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::diagram::DiagramRenderer;
use crate::attention::AttentionTensor;
use crate::error::{LensError, Result};

/// 1-indexed (layer, head) pair naming one diagram.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiagramId {
    pub layer: usize,
    pub head: usize,
}

impl DiagramId {
    pub fn from_indices(layer_index: usize, head_index: usize) -> Self {
        Self {
            layer: layer_index + 1,
            head: head_index + 1,
        }
    }

    pub fn file_name(&self) -> String {
        format!("Attention_Layer{}_Head{}.png", self.layer, self.head)
    }

    fn indices(&self) -> (usize, usize) {
        (self.layer - 1, self.head - 1)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Written diagrams in layer-major, head-minor order.
    pub written: Vec<(DiagramId, PathBuf)>,
}

impl SweepReport {
    pub fn len(&self) -> usize {
        self.written.len()
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.written.iter().map(|(_, path)| path.as_path())
    }
}

/// Renders and saves one diagram for every (layer, head) pair of a tensor.
pub struct AttentionSweep<'a> {
    renderer: DiagramRenderer<'a>,
    output_dir: PathBuf,
    workers: usize,
}

impl<'a> AttentionSweep<'a> {
    pub fn new(renderer: DiagramRenderer<'a>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            renderer,
            output_dir: output_dir.into(),
            workers: 1,
        }
    }

    /// Spread rendering over `workers` threads; `0` and `1` both mean serial.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn path_for(&self, id: DiagramId) -> PathBuf {
        self.output_dir.join(id.file_name())
    }

    /// Diagram ids in layer-major, head-minor order.
    pub fn plan(attention: &AttentionTensor) -> Vec<DiagramId> {
        (0..attention.layers())
            .flat_map(|layer| {
                (0..attention.heads()).map(move |head| DiagramId::from_indices(layer, head))
            })
            .collect()
    }

    /// Render every head and write it under its deterministic file name,
    /// overwriting earlier runs. The first write failure stops the sweep.
    pub fn run(&self, tokens: &[String], attention: &AttentionTensor) -> Result<SweepReport> {
        attention.ensure_tokens(tokens.len())?;
        let plan = Self::plan(attention);
        info!(
            layers = attention.layers(),
            heads = attention.heads(),
            tokens = tokens.len(),
            output_dir = %self.output_dir.display(),
            "rendering attention diagrams"
        );

        let workers = self.workers.min(plan.len()).max(1);
        let written = if workers == 1 {
            self.run_serial(&plan, tokens, attention)?
        } else {
            self.run_parallel(&plan, tokens, attention, workers)?
        };

        info!(count = written.len(), "attention diagrams written");
        Ok(SweepReport { written })
    }

    fn render_one(
        &self,
        id: DiagramId,
        tokens: &[String],
        attention: &AttentionTensor,
    ) -> Result<PathBuf> {
        let (layer, head) = id.indices();
        let canvas = self.renderer.render(tokens, attention.head(layer, head))?;
        let path = self.path_for(id);
        canvas.save_png(&path)?;
        debug!(layer = id.layer, head = id.head, path = %path.display(), "diagram saved");
        Ok(path)
    }

    fn run_serial(
        &self,
        plan: &[DiagramId],
        tokens: &[String],
        attention: &AttentionTensor,
    ) -> Result<Vec<(DiagramId, PathBuf)>> {
        plan.iter()
            .map(|&id| Ok((id, self.render_one(id, tokens, attention)?)))
            .collect()
    }

    fn run_parallel(
        &self,
        plan: &[DiagramId],
        tokens: &[String],
        attention: &AttentionTensor,
        workers: usize,
    ) -> Result<Vec<(DiagramId, PathBuf)>> {
        let (tx, rx) = unbounded::<DiagramId>();
        for &id in plan {
            // The receiver lives until the scope below ends.
            let _ = tx.send(id);
        }
        drop(tx);

        let failed = AtomicBool::new(false);
        let first_error: Mutex<Option<LensError>> = Mutex::new(None);
        let written = Mutex::new(Vec::with_capacity(plan.len()));

        thread::scope(|scope| {
            for _ in 0..workers {
                let rx = rx.clone();
                let (failed, first_error, written) = (&failed, &first_error, &written);
                scope.spawn(move || {
                    while let Ok(id) = rx.recv() {
                        if failed.load(Ordering::Relaxed) {
                            break;
                        }
                        match self.render_one(id, tokens, attention) {
                            Ok(path) => written.lock().push((id, path)),
                            Err(err) => {
                                failed.store(true, Ordering::Relaxed);
                                first_error.lock().get_or_insert(err);
                                break;
                            }
                        }
                    }
                });
            }
        });

        if let Some(err) = first_error.into_inner() {
            return Err(err);
        }
        let mut written = written.into_inner();
        written.sort_by_key(|(id, _)| *id);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_one_indexed() {
        assert_eq!(
            DiagramId::from_indices(0, 0).file_name(),
            "Attention_Layer1_Head1.png"
        );
        assert_eq!(
            DiagramId::from_indices(11, 9).file_name(),
            "Attention_Layer12_Head10.png"
        );
    }

    #[test]
    fn plan_is_layer_major() {
        let nested = vec![vec![vec![vec![1.0f32]]; 2]; 3];
        let tensor = AttentionTensor::from_nested(&nested).expect("tensor");
        let plan = AttentionSweep::plan(&tensor);
        let pairs: Vec<_> = plan.iter().map(|id| (id.layer, id.head)).collect();
        assert_eq!(pairs, [(1, 1), (1, 2), (2, 1), (2, 2), (3, 1), (3, 2)]);
    }

    #[test]
    fn ordering_sorts_by_layer_then_head() {
        let mut ids = vec![
            DiagramId { layer: 2, head: 1 },
            DiagramId { layer: 1, head: 3 },
            DiagramId { layer: 1, head: 2 },
        ];
        ids.sort();
        assert_eq!(
            ids,
            [
                DiagramId { layer: 1, head: 2 },
                DiagramId { layer: 1, head: 3 },
                DiagramId { layer: 2, head: 1 },
            ]
        );
    }
}
