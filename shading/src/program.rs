//! Linked GPU programs.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::driver::{Driver, DriverError, LinkedProgram, ProgramId, ProgramKind};
use crate::error::{ShadingError, ShadingResult};

#[derive(Debug)]
struct ProgramState {
    linked: Result<LinkedProgram, DriverError>,
    generation: u64,
}

/// A compiled and linked program.
///
/// Programs are handed out as `Arc<Program>` by the
/// [`ProgramCache`](crate::ProgramCache) and shared by every catalog that
/// loads the same name. A reload swaps the compiled state in place, so every
/// holder observes it without re-resolving the program. The driver handle is
/// released when the last holder drops it.
pub struct Program {
    name: String,
    driver: Weak<dyn Driver>,
    state: RwLock<ProgramState>,
}

impl Program {
    /// Compile and link the named program.
    ///
    /// A failed link still yields a program; check [`Program::is_valid`].
    pub(crate) fn compile(driver: &Arc<dyn Driver>, name: &str) -> Self {
        let linked = Self::link(driver.as_ref(), name);
        Self {
            name: name.to_string(),
            driver: Arc::downgrade(driver),
            state: RwLock::new(ProgramState {
                linked,
                generation: 0,
            }),
        }
    }

    fn link(driver: &dyn Driver, name: &str) -> Result<LinkedProgram, DriverError> {
        match driver.compile_program(name) {
            Ok(linked) => {
                log::info!(
                    "Compiled {:?} program '{}' as {:?}",
                    linked.kind,
                    name,
                    linked.id
                );
                Ok(linked)
            }
            Err(e) => {
                log::error!("Failed to compile program '{}': {}", name, e);
                Err(e)
            }
        }
    }

    /// Get the program name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the program linked successfully.
    pub fn is_valid(&self) -> bool {
        self.state.read().linked.is_ok()
    }

    /// Get the driver handle, if linked.
    pub fn id(&self) -> Option<ProgramId> {
        self.state.read().linked.as_ref().ok().map(|l| l.id)
    }

    /// Get the pipeline kind, if linked.
    pub fn kind(&self) -> Option<ProgramKind> {
        self.state.read().linked.as_ref().ok().map(|l| l.kind)
    }

    /// Number of times the program has been rebuilt.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Get the compile error of an invalid program.
    pub fn link_error(&self) -> Option<DriverError> {
        self.state.read().linked.as_ref().err().cloned()
    }

    /// Get the linked state, or the load error of an invalid program.
    pub fn linked(&self) -> ShadingResult<LinkedProgram> {
        self.state
            .read()
            .linked
            .clone()
            .map_err(ShadingError::from_compile)
    }

    /// Get the owning driver, if it still exists.
    pub fn driver(&self) -> Option<Arc<dyn Driver>> {
        self.driver.upgrade()
    }

    /// Make the program current for subsequent uniform uploads.
    pub fn activate(&self) -> ShadingResult<()> {
        let linked = self.linked()?;
        let driver = self.driver().ok_or(ShadingError::DriverLost)?;
        driver.use_program(linked.id)?;
        Ok(())
    }

    /// Recompile the program in place, replacing its compiled state.
    ///
    /// Returns `true` if the new build linked successfully. A failed rebuild
    /// leaves the program invalid.
    pub(crate) fn rebuild(&self) -> ShadingResult<bool> {
        let driver = self.driver().ok_or(ShadingError::DriverLost)?;
        let linked = Self::link(driver.as_ref(), &self.name);
        let valid = linked.is_ok();

        let mut state = self.state.write();
        if let Ok(old) = &state.linked {
            driver.delete_program(old.id);
        }
        state.linked = linked;
        state.generation += 1;
        log::info!(
            "Reloaded program '{}' (generation {})",
            self.name,
            state.generation
        );
        Ok(valid)
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        let Some(driver) = self.driver.upgrade() else {
            return;
        };
        if let Ok(linked) = &self.state.get_mut().linked {
            log::debug!("Releasing program '{}'", self.name);
            driver.delete_program(linked.id);
        }
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Program")
            .field("name", &self.name)
            .field("linked", &state.linked)
            .field("generation", &state.generation)
            .finish()
    }
}

// Ensure Program is Send + Sync
static_assertions::assert_impl_all!(Program: Send, Sync);
