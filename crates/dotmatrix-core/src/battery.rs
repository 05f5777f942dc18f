//! Battery-backed cartridge RAM persistence.
//!
//! Cartridge RAM lives behind an `Arc<Mutex<_>>` shared by the bank
//! controller (game thread) and a flush thread that rewrites the save file
//! whenever the RAM was touched since the last flush.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, warn};

use crate::error::EmuError;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Cartridge RAM plus a dirty marker set by every game write.
#[derive(Debug, Default)]
pub struct CartRam {
    pub data: Vec<u8>,
    pub dirty: bool,
}

pub type SharedRam = Arc<Mutex<CartRam>>;

pub fn shared_ram(size: usize) -> SharedRam {
    Arc::new(Mutex::new(CartRam {
        data: vec![0; size],
        dirty: false,
    }))
}

/// Lock cartridge RAM, recovering the guard if the flush thread panicked.
pub fn lock_ram(ram: &SharedRam) -> MutexGuard<'_, CartRam> {
    ram.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `game.gb` saves to `game.gb.sav`.
pub fn save_path_for(rom_path: &Path) -> PathBuf {
    let mut name = rom_path.as_os_str().to_owned();
    name.push(".sav");
    PathBuf::from(name)
}

/// Owns the flush thread for one battery-backed cartridge.
///
/// Dropping it stops the thread and performs a final flush.
#[derive(Debug)]
pub struct Battery {
    path: PathBuf,
    ram: SharedRam,
    stop: Arc<(Mutex<bool>, Condvar)>,
    worker: Option<JoinHandle<()>>,
}

impl Battery {
    /// Load `path` into `ram` (creating a zeroed save file when missing) and
    /// start flushing every `interval`.
    pub fn attach(path: PathBuf, ram: SharedRam, interval: Duration) -> Result<Self, EmuError> {
        load_or_create(&path, &ram)?;

        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let worker = {
            let path = path.clone();
            let ram = Arc::clone(&ram);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("battery-flush".into())
                .spawn(move || flush_loop(&path, &ram, &stop, interval))?
        };

        Ok(Self {
            path,
            ram,
            stop,
            worker: Some(worker),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the RAM image now if it changed since the last flush.
    pub fn flush(&self) -> Result<bool, EmuError> {
        flush_if_dirty(&self.path, &self.ram)
    }
}

impl Drop for Battery {
    fn drop(&mut self) {
        {
            let (lock, cvar) = &*self.stop;
            *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
            cvar.notify_all();
        }
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("battery flush thread panicked");
        }
        if let Err(e) = self.flush() {
            warn!("final save flush to {} failed: {e}", self.path.display());
        }
    }
}

fn load_or_create(path: &Path, ram: &SharedRam) -> Result<(), EmuError> {
    let mut guard = lock_ram(ram);
    match fs::read(path) {
        Ok(bytes) => {
            for (dst, src) in guard.data.iter_mut().zip(bytes.iter()) {
                *dst = *src;
            }
            debug!("loaded {} save bytes from {}", bytes.len(), path.display());
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            fs::write(path, &guard.data)?;
            debug!("created empty save file {}", path.display());
        }
        Err(e) => return Err(e.into()),
    }
    guard.dirty = false;
    Ok(())
}

fn flush_if_dirty(path: &Path, ram: &SharedRam) -> Result<bool, EmuError> {
    let mut guard = lock_ram(ram);
    if !guard.dirty {
        return Ok(false);
    }
    fs::write(path, &guard.data)?;
    guard.dirty = false;
    Ok(true)
}

fn flush_loop(path: &Path, ram: &SharedRam, stop: &(Mutex<bool>, Condvar), interval: Duration) {
    let (lock, cvar) = stop;
    let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
    loop {
        let (guard, _) = cvar
            .wait_timeout(stopped, interval)
            .unwrap_or_else(PoisonError::into_inner);
        stopped = guard;
        if *stopped {
            break;
        }
        if let Err(e) = flush_if_dirty(path, ram) {
            warn!("save flush to {} failed: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_suffix_is_appended() {
        assert_eq!(
            save_path_for(Path::new("roms/tetris.gb")),
            PathBuf::from("roms/tetris.gb.sav")
        );
    }

    #[test]
    fn missing_save_is_created_zeroed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.gb.sav");
        let ram = shared_ram(0x2000);
        let battery = Battery::attach(path.clone(), ram, Duration::from_secs(60)).unwrap();
        assert_eq!(fs::read(&path).unwrap(), vec![0u8; 0x2000]);
        drop(battery);
    }

    #[test]
    fn drop_flushes_dirty_ram() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.gb.sav");
        let ram = shared_ram(16);
        let battery =
            Battery::attach(path.clone(), Arc::clone(&ram), Duration::from_secs(60)).unwrap();
        {
            let mut guard = lock_ram(&ram);
            guard.data[3] = 0x42;
            guard.dirty = true;
        }
        drop(battery);
        assert_eq!(fs::read(&path).unwrap()[3], 0x42);
        assert!(!lock_ram(&ram).dirty);
    }

    #[test]
    fn flush_skips_clean_ram() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.gb.sav");
        let ram = shared_ram(16);
        let battery = Battery::attach(path, Arc::clone(&ram), Duration::from_secs(60)).unwrap();
        assert!(!battery.flush().unwrap());
        lock_ram(&ram).dirty = true;
        assert!(battery.flush().unwrap());
    }
}
