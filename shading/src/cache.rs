//! Name-keyed program registry.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::driver::Driver;
use crate::error::ShadingResult;
use crate::program::Program;

/// Registry of compiled programs keyed by name.
///
/// The cache holds only weak references. Loading a name that still has a live
/// holder returns the same [`Program`]; once every holder has dropped it, the
/// next load compiles the program from scratch.
///
/// A cache belongs to one graphics context and should be dropped before the
/// driver is torn down.
pub struct ProgramCache {
    driver: Arc<dyn Driver>,
    programs: Mutex<HashMap<String, Weak<Program>>>,
}

impl ProgramCache {
    /// Create an empty cache compiling through `driver`.
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        log::debug!("Creating program cache on {} driver", driver.name());
        Self {
            driver,
            programs: Mutex::new(HashMap::new()),
        }
    }

    /// Get the driver programs are compiled with.
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Get the live program for `name`, compiling it if needed.
    ///
    /// Programs that fail to link are returned (and cached) too, so that a
    /// later [`ProgramCache::reload_program`] can fix them for every holder.
    pub fn load_program(&self, name: &str) -> Arc<Program> {
        let mut programs = self.programs.lock();
        if let Some(program) = programs.get(name).and_then(Weak::upgrade) {
            log::trace!("Program cache hit for '{}'", name);
            return program;
        }

        let program = Arc::new(Program::compile(&self.driver, name));
        programs.insert(name.to_string(), Arc::downgrade(&program));
        program
    }

    /// Recompile a live program in place.
    ///
    /// Returns `Ok(false)` if no live program exists under `name` or if the
    /// rebuild failed to link.
    pub fn reload_program(&self, name: &str) -> ShadingResult<bool> {
        let programs = self.programs.lock();
        match programs.get(name).and_then(Weak::upgrade) {
            Some(program) => program.rebuild(),
            None => {
                log::warn!("Cannot reload program '{}': not loaded", name);
                Ok(false)
            }
        }
    }

    /// Recompile every live program. Returns how many linked successfully.
    pub fn reload_all(&self) -> ShadingResult<usize> {
        let live: Vec<Arc<Program>> = self
            .programs
            .lock()
            .values()
            .filter_map(Weak::upgrade)
            .collect();
        let mut reloaded = 0;
        for program in live {
            if program.rebuild()? {
                reloaded += 1;
            }
        }
        Ok(reloaded)
    }

    /// Returns `true` if a live program exists under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.programs
            .lock()
            .get(name)
            .is_some_and(|p| p.strong_count() > 0)
    }

    /// Number of live programs.
    pub fn live_programs(&self) -> usize {
        self.programs
            .lock()
            .values()
            .filter(|p| p.strong_count() > 0)
            .count()
    }

    /// Drop entries whose programs have been released.
    pub fn purge_expired(&self) -> usize {
        let mut programs = self.programs.lock();
        let before = programs.len();
        programs.retain(|_, p| p.strong_count() > 0);
        before - programs.len()
    }
}

impl std::fmt::Debug for ProgramCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramCache")
            .field("driver", &self.driver.name())
            .field("entries", &self.programs.lock().len())
            .finish()
    }
}

static_assertions::assert_impl_all!(ProgramCache: Send, Sync);

#[cfg(all(test, feature = "headless"))]
mod tests {
    use super::*;
    use crate::driver::{HeadlessDriver, ProgramDeclaration};

    fn setup() -> (Arc<HeadlessDriver>, ProgramCache) {
        let headless = Arc::new(HeadlessDriver::new());
        headless.declare_program("blit", ProgramDeclaration::graphics());
        headless.declare_program("cull", ProgramDeclaration::compute());
        let cache = ProgramCache::new(headless.clone());
        (headless, cache)
    }

    #[test]
    fn test_load_deduplicates() {
        let (headless, cache) = setup();
        let a = cache.load_program("blit");
        let b = cache.load_program("blit");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(headless.compile_count("blit"), 1);
    }

    #[test]
    fn test_load_after_release_recompiles() {
        let (headless, cache) = setup();
        let first = cache.load_program("blit").id();
        assert!(!cache.contains("blit"));

        let again = cache.load_program("blit");
        assert_ne!(again.id(), first);
        assert_eq!(headless.compile_count("blit"), 2);
    }

    #[test]
    fn test_reload_in_place() {
        let (headless, cache) = setup();
        let program = cache.load_program("blit");
        let old = program.id();

        assert!(cache.reload_program("blit").unwrap());
        assert_ne!(program.id(), old);
        assert_eq!(program.generation(), 1);
        assert_eq!(headless.compile_count("blit"), 2);
    }

    #[test]
    fn test_reload_missing() {
        let (_, cache) = setup();
        assert!(!cache.reload_program("blit").unwrap());
        assert!(!cache.reload_program("unknown").unwrap());
    }

    #[test]
    fn test_reload_all() {
        let (_, cache) = setup();
        let _blit = cache.load_program("blit");
        let _cull = cache.load_program("cull");
        assert_eq!(cache.reload_all().unwrap(), 2);
    }

    #[test]
    fn test_purge_expired() {
        let (_, cache) = setup();
        let blit = cache.load_program("blit");
        drop(cache.load_program("cull"));
        assert_eq!(cache.live_programs(), 1);
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.contains("blit"));
        drop(blit);
        assert_eq!(cache.purge_expired(), 1);
    }

    #[test]
    fn test_failed_program_is_cached() {
        let (headless, cache) = setup();
        let program = cache.load_program("missing");
        assert!(!program.is_valid());

        headless.declare_program("missing", ProgramDeclaration::graphics());
        assert!(cache.reload_program("missing").unwrap());
        assert!(program.is_valid());
    }
}
