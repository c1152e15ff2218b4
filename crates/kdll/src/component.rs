//! Static component kernels that combined kernels are assembled from.

use thiserror::Error;

use crate::caching::FIRST_KCID;

/// Largest KUID a component kernel may carry; ids from [`FIRST_KCID`] up
/// belong to combined kernels.
pub const MAX_COMPONENT_KUID: i32 = FIRST_KCID - 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComponentError {
    #[error("component kernel id {kuid} is outside 0..={max}")]
    KuidOutOfRange { kuid: i32, max: i32 },
}

/// One precompiled component kernel, addressed by its kernel-unique id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentKernel {
    pub kuid: i32,
    pub name: String,
    pub binary: Vec<u8>,
}

impl ComponentKernel {
    #[inline]
    pub fn size(&self) -> usize {
        self.binary.len()
    }
}

/// Component kernels indexed by KUID.
///
/// Indices that were never assigned hold an unbound placeholder so that
/// `get` can tell a stale or missing kernel apart from a valid one.
#[derive(Clone, Debug, Default)]
pub struct ComponentKernels {
    kernels: Vec<ComponentKernel>,
}

impl ComponentKernels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a kernel at the next free KUID and returns that id.
    pub fn push(&mut self, name: impl Into<String>, binary: Vec<u8>) -> Result<i32, ComponentError> {
        let kuid = i32::try_from(self.kernels.len()).unwrap_or(i32::MAX);
        let index = Self::index_for(kuid)?;
        debug_assert_eq!(index, self.kernels.len());
        self.kernels.push(ComponentKernel {
            kuid,
            name: name.into(),
            binary,
        });
        Ok(kuid)
    }

    /// Places a kernel at `kuid`, padding any gap with unbound placeholders.
    /// Returns the kernel previously stored at that index, if it was bound.
    pub fn insert(
        &mut self,
        kuid: i32,
        name: impl Into<String>,
        binary: Vec<u8>,
    ) -> Result<Option<ComponentKernel>, ComponentError> {
        let index = Self::index_for(kuid)?;
        if index >= self.kernels.len() {
            self.kernels.resize_with(index + 1, || ComponentKernel {
                kuid: -1,
                name: String::new(),
                binary: Vec::new(),
            });
        }
        let previous = std::mem::replace(
            &mut self.kernels[index],
            ComponentKernel {
                kuid,
                name: name.into(),
                binary,
            },
        );
        Ok((previous.kuid == kuid).then_some(previous))
    }

    fn index_for(kuid: i32) -> Result<usize, ComponentError> {
        match usize::try_from(kuid) {
            Ok(index) if kuid <= MAX_COMPONENT_KUID => Ok(index),
            _ => Err(ComponentError::KuidOutOfRange {
                kuid,
                max: MAX_COMPONENT_KUID,
            }),
        }
    }

    /// Looks up a component kernel; placeholders and empty binaries are misses.
    pub fn get(&self, kuid: i32) -> Option<&ComponentKernel> {
        let index = usize::try_from(kuid).ok()?;
        self.kernels
            .get(index)
            .filter(|kernel| kernel.kuid == kuid && !kernel.binary.is_empty())
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Valid kernels in KUID order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentKernel> {
        self.kernels.iter().filter(|kernel| kernel.kuid >= 0 && !kernel.binary.is_empty())
    }
}
