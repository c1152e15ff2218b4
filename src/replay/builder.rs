//! Stand-in for the kernel compiler: assembles combined kernels by
//! concatenating component kernels picked from the filter.

use kdll::{
    ColorSpace, ComponentError, ComponentKernels, CscMatrix, CscParams, FilterEntry, Format, Processing, Rotation, Sampling, simple_hash
};
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Pipeline stage a component kernel implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Load,
    Sample,
    Rotate,
    Process,
    Save,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("filter is empty")]
    EmptyFilter,
    #[error("no {stage:?} component kernel for raw value {value}")]
    MissingComponent { stage: Stage, value: i32 },
    #[error("component kernel could not be registered: {0}")]
    Component(#[from] ComponentError),
}

/// Result of building one combined kernel.
#[derive(Clone, Debug)]
pub struct BuiltKernel {
    pub kernel: Vec<u8>,
    /// Filter after rule normalisation; what the kernel actually implements.
    pub filter: Vec<FilterEntry>,
    pub csc_params: CscParams,
    pub colorfill_cspace: ColorSpace,
    pub components: Vec<i32>,
}

pub struct SyntheticKernelBuilder {
    components: ComponentKernels,
    by_stage: FxHashMap<(Stage, i32), i32>,
}

impl SyntheticKernelBuilder {
    /// Registers one component kernel per stage and enum value.
    pub fn new() -> Result<Self, BuildError> {
        let mut builder = Self {
            components: ComponentKernels::new(),
            by_stage: FxHashMap::default(),
        };
        for format in Format::ALL {
            builder.register(Stage::Load, format.raw(), format.name())?;
            builder.register(Stage::Save, format.raw(), format.name())?;
        }
        for sampling in Sampling::ALL {
            builder.register(Stage::Sample, sampling.raw(), sampling.name())?;
        }
        for rotation in Rotation::ALL {
            builder.register(Stage::Rotate, rotation.raw(), rotation.name())?;
        }
        for process in Processing::ALL {
            builder.register(Stage::Process, process.raw(), process.name())?;
        }
        Ok(builder)
    }

    fn register(&mut self, stage: Stage, value: i32, label: &str) -> Result<(), BuildError> {
        let name = format!("{stage:?}_{label}");
        let seed = simple_hash(name.as_bytes());
        let len = 32 + (seed % 96) as usize;
        let binary = (0..len).map(|i| (seed >> ((i % 4) * 8)) as u8 ^ i as u8).collect();
        let kuid = self.components.push(name, binary)?;
        self.by_stage.insert((stage, value), kuid);
        Ok(())
    }

    pub fn components(&self) -> &ComponentKernels {
        &self.components
    }

    /// Builds the combined kernel for `filter`. The last entry is the render target.
    pub fn build(&self, filter: &[FilterEntry]) -> Result<BuiltKernel, BuildError> {
        let Some((target, sources)) = filter.split_last() else {
            return Err(BuildError::EmptyFilter);
        };

        let mut modified = Vec::with_capacity(filter.len());
        let mut components = Vec::new();
        let mut csc_params = CscParams::default();

        for (index, source) in sources.iter().enumerate() {
            let entry = normalise(*source);
            components.push(self.component(Stage::Load, entry.format)?);
            components.push(self.component(Stage::Sample, entry.sampling)?);
            components.push(self.component(Stage::Rotate, entry.rotation)?);
            components.push(self.component(Stage::Process, entry.process)?);

            if let (Some(input), Some(output)) = (entry.cspace(), target.cspace())
                && input != ColorSpace::None
                && input != output
            {
                let matrix = CscMatrix::new(input, output, index as i32, CscMatrix::IDENTITY);
                if !csc_params.push(matrix) {
                    tracing::debug!(layer = index, "csc matrix table full, layer converted in place");
                }
            }
            modified.push(entry);
        }
        components.push(self.component(Stage::Save, target.format)?);
        modified.push(*target);

        let kernel = components
            .iter()
            .filter_map(|kuid| self.components.get(*kuid))
            .flat_map(|component| component.binary.iter().copied())
            .collect();
        let colorfill_cspace = sources
            .first()
            .and_then(FilterEntry::cspace)
            .or_else(|| target.cspace())
            .unwrap_or_default();

        Ok(BuiltKernel {
            kernel,
            filter: modified,
            csc_params,
            colorfill_cspace,
            components,
        })
    }

    fn component(&self, stage: Stage, value: i32) -> Result<i32, BuildError> {
        self.by_stage
            .get(&(stage, value))
            .copied()
            .ok_or(BuildError::MissingComponent { stage, value })
    }
}

/// Resolves wildcard selections to the concrete variant the kernel implements.
fn normalise(entry: FilterEntry) -> FilterEntry {
    let mut entry = entry;
    if entry.sampling() == Some(Sampling::ScalingAny) {
        entry = entry.with_sampling(Sampling::Scaling);
    }
    if matches!(entry.process(), Some(Processing::Any | Processing::Source)) {
        entry = entry.with_process(Processing::Composite);
    }
    entry
}
