//! Station configuration: the `station.conf` file, the last known GPS fix
//! cache, and the credential-set roll-forward protocol. Grounded on
//! `original_source/src/sys.c`'s `setupConfigFilenames`/`checkRollForward`/
//! `updateConfigFiles`/`backupConfigFiles` and the `CONF_PARAM` table in
//! `s2conf.h`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StationError};

/// `station_conf` section of `station.conf`: the handful of settings the
/// original reads via `CONF_PARAM` rather than from region/router config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationSection {
    pub routerid: Option<String>,
    #[serde(default)]
    pub no_dc: bool,
    #[serde(default)]
    pub no_cca: bool,
    #[serde(default)]
    pub no_dwell: bool,
    pub log_file: Option<String>,
    pub log_level: Option<String>,
    pub log_size: Option<u64>,
    pub log_rotate: Option<u32>,
}

/// `station.conf`: `{"station_conf": {...}, "radio_conf"|"sx1301_conf"|"sx1302_conf": {...}}`.
/// The radio section is concentrator-model-specific JSON that the RAL layer
/// passes through verbatim to the slave in a `CONFIG` record, so it's kept
/// as an opaque [`serde_json::Value`] here rather than typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConf {
    #[serde(default)]
    pub station_conf: StationSection,
    #[serde(flatten)]
    pub radio_conf: serde_json::Map<String, serde_json::Value>,
}

/// `~temp/station.lastpos`: `[lat, lon]`, serialized as a bare JSON array —
/// a tuple struct gets Serde's array representation for free.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LastPos(pub f64, pub f64);

/// Reads/writes the handful of on-flash files the station depends on.
/// A trait rather than bare functions so tests can substitute an in-memory
/// store without touching the filesystem.
pub trait ConfigStore {
    fn read_station_conf(&self) -> Result<StationConf>;
    fn read_last_pos(&self) -> Result<Option<LastPos>>;
    fn write_last_pos(&self, pos: LastPos) -> Result<()>;
    /// Paths of `slave-N.conf` files present, in ascending `N` order — one
    /// concentrator slave is spawned per entry, up to `MAX_TXUNITS`.
    fn slave_conf_paths(&self) -> Result<Vec<PathBuf>>;
}

pub struct FsConfigStore {
    home_dir: PathBuf,
    temp_dir: PathBuf,
}

impl FsConfigStore {
    pub fn new(home_dir: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        FsConfigStore {
            home_dir: home_dir.into(),
            temp_dir: temp_dir.into(),
        }
    }

    fn home(&self, name: &str) -> PathBuf {
        self.home_dir.join(name)
    }

    fn temp(&self, name: &str) -> PathBuf {
        self.temp_dir.join(name)
    }
}

impl ConfigStore for FsConfigStore {
    fn read_station_conf(&self) -> Result<StationConf> {
        let path = self.home("station.conf");
        let data = fs::read_to_string(&path).map_err(|e| StationError::ConfigFatal(format!(
            "cannot read {}: {e}",
            path.display()
        )))?;
        serde_json::from_str(&data).map_err(StationError::Json)
    }

    fn read_last_pos(&self) -> Result<Option<LastPos>> {
        let path = self.temp("station.lastpos");
        match fs::read_to_string(&path) {
            Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StationError::Io(e)),
        }
    }

    fn write_last_pos(&self, pos: LastPos) -> Result<()> {
        let path = self.temp("station.lastpos");
        let data = serde_json::to_string(&pos)?;
        fs::write(&path, data).map_err(StationError::Io)
    }

    fn slave_conf_paths(&self) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for n in 0..crate::constants::MAX_TXUNITS {
            let path = self.home(&format!("slave-{n}.conf"));
            if path.exists() {
                found.push(path);
            }
        }
        Ok(found)
    }
}

// ---------------------------------------------------------------------
// Credential roll-forward
// ---------------------------------------------------------------------

/// Credential category: separate URI/trust/cert/key sets for the LNS
/// ("tc") and CUPS connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredCat {
    Cups,
    Tc,
}

impl CredCat {
    fn name(self) -> &'static str {
        match self {
            CredCat::Cups => "cups",
            CredCat::Tc => "tc",
        }
    }
}

/// Which generation of a credential set: the active set, its last-known-good
/// backup, a factory/bootstrap fallback, or an incoming replacement still
/// being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredSet {
    Reg,
    Bak,
    Boot,
    Temp,
}

impl CredSet {
    fn suffix(self) -> &'static str {
        match self {
            CredSet::Reg => "",
            CredSet::Bak => "-bak",
            CredSet::Boot => "-boot",
            CredSet::Temp => "-temp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredExt {
    Trust,
    Crt,
    Key,
    Uri,
}

impl CredExt {
    fn name(self) -> &'static str {
        match self {
            CredExt::Trust => "trust",
            CredExt::Crt => "crt",
            CredExt::Key => "key",
            CredExt::Uri => "uri",
        }
    }
}

const ALL_EXTS: [CredExt; 4] = [CredExt::Trust, CredExt::Crt, CredExt::Key, CredExt::Uri];

fn cred_filename(dir: &Path, cat: CredCat, set: CredSet, ext: CredExt) -> PathBuf {
    dir.join(format!("{}{}.{}", cat.name(), set.suffix(), ext.name()))
}

fn taf_upd(dir: &Path, cat: CredCat) -> PathBuf {
    dir.join(format!("{}-temp.upd", cat.name()))
}
fn taf_cpy(dir: &Path, cat: CredCat) -> PathBuf {
    dir.join(format!("{}-temp.cpy", cat.name()))
}
fn taf_don(dir: &Path, cat: CredCat) -> PathBuf {
    dir.join(format!("{}-bak.done", cat.name()))
}

/// Reads the `{cat}{set}.uri` file's contents (the bare connection URI the
/// CUPS client leaves behind) and parses it. The CUPS client itself is out
/// of scope; this only honors the file layout it writes.
pub fn read_cred_uri(dir: &Path, cat: CredCat, set: CredSet) -> Result<url::Url> {
    let path = cred_filename(dir, cat, set, CredExt::Uri);
    let raw = fs::read_to_string(&path)
        .map_err(|e| StationError::ConfigFatal(format!("cannot read {}: {e}", path.display())))?;
    url::Url::parse(raw.trim()).map_err(|e| StationError::ConfigFatal(format!("bad URI in {}: {e}", path.display())))
}

/// Renames the freshly-written `-temp` credential set over the active
/// (`Reg`) set. Creates the `-temp.upd` transaction marker first so that a
/// crash mid-rename can be completed on the next `check_roll_forward` call
/// instead of leaving a half-updated credential set.
pub fn commit_update(dir: &Path, cat: CredCat) -> Result<()> {
    let marker = taf_upd(dir, cat);
    fs::write(&marker, b"")
        .map_err(|e| StationError::ConfigFatal(format!("cannot create {}: {e}", marker.display())))?;
    finish_update(dir, cat)
}

fn finish_update(dir: &Path, cat: CredCat) -> Result<()> {
    for ext in ALL_EXTS {
        let temp = cred_filename(dir, cat, CredSet::Temp, ext);
        let reg = cred_filename(dir, cat, CredSet::Reg, ext);
        if temp.exists() {
            fs::rename(&temp, &reg).map_err(|e| {
                StationError::ConfigFatal(format!(
                    "cannot rename {} -> {}: {e}",
                    temp.display(),
                    reg.display()
                ))
            })?;
        }
    }
    let _ = fs::remove_file(taf_upd(dir, cat));
    Ok(())
}

/// Copies the active credential set to the `-bak` set, marking the
/// operation with `-temp.cpy` until the copy (and the `-bak.done`
/// completion marker) finishes. A no-op if a backup already completed this
/// run (`bak_done`).
pub fn backup_config(dir: &Path, cat: CredCat, bak_done: &mut bool) -> Result<()> {
    if *bak_done {
        return Ok(());
    }
    let marker = taf_cpy(dir, cat);
    fs::write(&marker, b"")
        .map_err(|e| StationError::ConfigFatal(format!("cannot create {}: {e}", marker.display())))?;
    finish_backup(dir, cat, bak_done)
}

fn finish_backup(dir: &Path, cat: CredCat, bak_done: &mut bool) -> Result<()> {
    let don = taf_don(dir, cat);
    remove_if_exists(&don)?;
    for ext in ALL_EXTS {
        remove_if_exists(&cred_filename(dir, cat, CredSet::Bak, ext))?;
    }
    for ext in ALL_EXTS {
        let reg = cred_filename(dir, cat, CredSet::Reg, ext);
        if let Ok(data) = fs::read(&reg) {
            let bak = cred_filename(dir, cat, CredSet::Bak, ext);
            fs::write(&bak, data)
                .map_err(|e| StationError::ConfigFatal(format!("cannot write {}: {e}", bak.display())))?;
        }
    }
    fs::write(&don, b"")
        .map_err(|e| StationError::ConfigFatal(format!("cannot write {}: {e}", don.display())))?;
    let _ = fs::remove_file(taf_cpy(dir, cat));
    *bak_done = true;
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StationError::ConfigFatal(format!(
            "cannot remove {}: {e}",
            path.display()
        ))),
    }
}

/// Runs at station startup: resumes any credential update or backup that
/// was interrupted mid-transaction (by its marker file still existing from
/// a previous run), and notes which categories already have a completed
/// backup. `bak_done` must have one entry per [`CredCat`] in the same order
/// returned by iterating `[CredCat::Cups, CredCat::Tc]`.
pub fn check_roll_forward(dir: &Path, bak_done: &mut [bool; 2]) -> Result<()> {
    for (i, cat) in [CredCat::Cups, CredCat::Tc].into_iter().enumerate() {
        if taf_upd(dir, cat).exists() {
            finish_update(dir, cat)?;
        }
        if taf_cpy(dir, cat).exists() {
            finish_backup(dir, cat, &mut bak_done[i])?;
        }
        if taf_don(dir, cat).exists() {
            bak_done[i] = true;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn station_conf_round_trips_through_json() {
        let json = r#"{"station_conf":{"routerid":"aa:bb","no_dc":true},"sx1301_conf":{"foo":1}}"#;
        let conf: StationConf = serde_json::from_str(json).unwrap();
        assert_eq!(conf.station_conf.routerid.as_deref(), Some("aa:bb"));
        assert!(conf.station_conf.no_dc);
        assert_eq!(conf.radio_conf.get("sx1301_conf").unwrap()["foo"], 1);
    }

    #[test]
    fn last_pos_persists_via_store() {
        let dir = tempdir().unwrap();
        let store = FsConfigStore::new(dir.path(), dir.path());
        assert!(store.read_last_pos().unwrap().is_none());
        store.write_last_pos(LastPos(12.5, -8.25)).unwrap();
        let read = store.read_last_pos().unwrap().unwrap();
        assert_eq!((read.0, read.1), (12.5, -8.25));
    }

    #[test]
    fn read_cred_uri_parses_the_stored_connection_string() {
        let dir = tempdir().unwrap();
        fs::write(cred_filename(dir.path(), CredCat::Tc, CredSet::Reg, CredExt::Uri), b"wss://lns.example.org:6038\n").unwrap();
        let uri = read_cred_uri(dir.path(), CredCat::Tc, CredSet::Reg).unwrap();
        assert_eq!(uri.host_str(), Some("lns.example.org"));
        assert_eq!(uri.port(), Some(6038));
    }

    #[test]
    fn commit_update_renames_temp_over_reg() {
        let dir = tempdir().unwrap();
        fs::write(cred_filename(dir.path(), CredCat::Tc, CredSet::Temp, CredExt::Uri), b"new-uri").unwrap();
        commit_update(dir.path(), CredCat::Tc).unwrap();
        let reg = cred_filename(dir.path(), CredCat::Tc, CredSet::Reg, CredExt::Uri);
        assert_eq!(fs::read(reg).unwrap(), b"new-uri");
        assert!(!taf_upd(dir.path(), CredCat::Tc).exists());
    }

    #[test]
    fn interrupted_update_completes_on_roll_forward() {
        let dir = tempdir().unwrap();
        fs::write(cred_filename(dir.path(), CredCat::Cups, CredSet::Temp, CredExt::Key), b"k").unwrap();
        fs::write(taf_upd(dir.path(), CredCat::Cups), b"").unwrap();
        let mut bak_done = [false, false];
        check_roll_forward(dir.path(), &mut bak_done).unwrap();
        let reg = cred_filename(dir.path(), CredCat::Cups, CredSet::Reg, CredExt::Key);
        assert_eq!(fs::read(reg).unwrap(), b"k");
    }

    #[test]
    fn backup_is_idempotent_once_done() {
        let dir = tempdir().unwrap();
        fs::write(cred_filename(dir.path(), CredCat::Tc, CredSet::Reg, CredExt::Crt), b"cert").unwrap();
        let mut done = false;
        backup_config(dir.path(), CredCat::Tc, &mut done).unwrap();
        assert!(done);
        let bak = cred_filename(dir.path(), CredCat::Tc, CredSet::Bak, CredExt::Crt);
        assert_eq!(fs::read(bak).unwrap(), b"cert");
        // Second call is a no-op (bak_done short-circuits it).
        backup_config(dir.path(), CredCat::Tc, &mut done).unwrap();
    }
}
