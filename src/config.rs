use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use dotmatrix_core::joypad::JoypadState;
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Button {
    A,
    B,
    Start,
    Select,
    Up,
    Down,
    Left,
    Right,
}

impl Button {
    fn press(self, state: &mut JoypadState) {
        match self {
            Button::A => state.a = true,
            Button::B => state.b = true,
            Button::Start => state.start = true,
            Button::Select => state.select = true,
            Button::Up => state.up = true,
            Button::Down => state.down = true,
            Button::Left => state.left = true,
            Button::Right => state.right = true,
        }
    }
}

/// Buttons held from `first_frame` through `last_frame` (inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedInput {
    pub first_frame: u64,
    pub last_frame: u64,
    pub buttons: Vec<Button>,
}

impl ScriptedInput {
    pub fn covers(&self, frame: u64) -> bool {
        (self.first_frame..=self.last_frame).contains(&frame)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bootrom_path: Option<PathBuf>,
    pub skip_boot: bool,
    pub pace: bool,
    pub debug_buffers: bool,
    pub save_flush_secs: u64,
    pub inputs: Vec<ScriptedInput>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bootrom_path: None,
            skip_boot: false,
            pace: true,
            debug_buffers: false,
            save_flush_secs: 5,
            inputs: Vec::new(),
        }
    }
}

impl Config {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.save_flush_secs.max(1))
    }

    /// Buttons the script holds during `frame`. Overlapping entries combine.
    pub fn joypad_at(&self, frame: u64) -> JoypadState {
        let mut state = JoypadState::default();
        for input in self.inputs.iter().filter(|i| i.covers(frame)) {
            for button in &input.buttons {
                button.press(&mut state);
            }
        }
        state
    }
}

pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("dotmatrix").join("config.toml");
        }
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("dotmatrix").join("config.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("dotmatrix")
            .join("config.toml");
    }

    PathBuf::from("config.toml")
}

pub fn load_from_file(path: &Path) -> Config {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return Config::default(),
    };

    match toml::from_str::<Config>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse config {}: {e}; using defaults",
                path.display()
            );
            Config::default()
        }
    }
}

pub fn save_to_file(path: &Path, cfg: &Config) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let text = toml::to_string_pretty(cfg).map_err(std::io::Error::other)?;
    std::fs::write(path, text)
}
