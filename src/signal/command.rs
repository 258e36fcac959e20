use std::cell::Cell;
use std::process::{Command, Output};

use super::{HandlerRegistry, PreferenceHandler, PreferenceSignal, SubscriptionId};

pub type Probe = Box<dyn Fn() -> Option<bool>>;

/// Reads the desktop color-scheme setting through platform CLI tools.
///
/// There is no push notification; call [`refresh`](Self::refresh) on an
/// interval to pick up changes.
pub struct CommandPreferenceSignal {
    probe: Probe,
    current: Cell<Option<bool>>,
    registry: HandlerRegistry,
}

impl CommandPreferenceSignal {
    pub fn detect() -> Self {
        Self::with_probe(Box::new(probe_platform))
    }

    pub fn with_probe(probe: Probe) -> Self {
        let current = probe();
        tracing::debug!(prefers_dark = ?current, "probed system color scheme");
        Self {
            probe,
            current: Cell::new(current),
            registry: HandlerRegistry::default(),
        }
    }

    /// Probes again and notifies subscribers if the reported value changed.
    pub fn refresh(&self) -> Option<bool> {
        let next = (self.probe)();
        let previous = self.current.replace(next);
        if previous != next {
            tracing::info!(from = ?previous, to = ?next, "system color scheme changed");
            if let Some(prefers_dark) = next {
                self.registry.dispatch(prefers_dark);
            }
        }
        next
    }
}

impl PreferenceSignal for CommandPreferenceSignal {
    fn prefers_dark(&self) -> Option<bool> {
        self.current.get()
    }

    fn subscribe(&self, handler: PreferenceHandler) -> SubscriptionId {
        self.registry.insert(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.registry.remove(id);
    }
}

#[cfg_attr(
    not(any(target_os = "linux", target_os = "macos", target_os = "windows")),
    allow(dead_code)
)]
fn run(program: &str, args: &[&str]) -> Option<Output> {
    match Command::new(program).args(args).output() {
        Ok(output) => Some(output),
        Err(err) => {
            tracing::trace!(program, ?err, "color scheme probe unavailable");
            None
        }
    }
}

#[cfg(target_os = "linux")]
fn probe_platform() -> Option<bool> {
    let scheme = run(
        "gsettings",
        &["get", "org.gnome.desktop.interface", "color-scheme"],
    )
    .filter(|output| output.status.success())
    .and_then(|output| parse_gsettings_color_scheme(&String::from_utf8_lossy(&output.stdout)));
    if scheme.is_some() {
        return scheme;
    }

    run("gsettings", &["get", "org.gnome.desktop.interface", "gtk-theme"])
        .filter(|output| output.status.success())
        .and_then(|output| parse_gsettings_gtk_theme(&String::from_utf8_lossy(&output.stdout)))
}

#[cfg(target_os = "macos")]
fn probe_platform() -> Option<bool> {
    // `defaults` exits non-zero when AppleInterfaceStyle is unset, which means light.
    run("defaults", &["read", "-g", "AppleInterfaceStyle"]).map(|output| {
        output.status.success()
            && parse_macos_interface_style(&String::from_utf8_lossy(&output.stdout))
    })
}

#[cfg(target_os = "windows")]
fn probe_platform() -> Option<bool> {
    run(
        "reg",
        &[
            "query",
            r"HKCU\Software\Microsoft\Windows\CurrentVersion\Themes\Personalize",
            "/v",
            "AppsUseLightTheme",
        ],
    )
    .filter(|output| output.status.success())
    .and_then(|output| {
        parse_windows_apps_use_light_theme(&String::from_utf8_lossy(&output.stdout))
    })
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn probe_platform() -> Option<bool> {
    None
}

/// `'prefer-dark'` / `'prefer-light'`; `'default'` carries no preference.
pub fn parse_gsettings_color_scheme(raw: &str) -> Option<bool> {
    let value = raw.trim().trim_matches('\'').to_ascii_lowercase();
    match value.as_str() {
        "prefer-dark" => Some(true),
        "prefer-light" => Some(false),
        _ => None,
    }
}

/// Only theme names that say "dark" or "light" carry a preference.
pub fn parse_gsettings_gtk_theme(raw: &str) -> Option<bool> {
    let name = raw.trim().trim_matches('\'').to_ascii_lowercase();
    if name.contains("dark") {
        Some(true)
    } else if name.contains("light") {
        Some(false)
    } else {
        None
    }
}

pub fn parse_macos_interface_style(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("dark")
}

/// `AppsUseLightTheme    REG_DWORD    0x0` means dark.
pub fn parse_windows_apps_use_light_theme(raw: &str) -> Option<bool> {
    raw.lines()
        .find(|line| line.contains("AppsUseLightTheme"))
        .and_then(|line| line.split_whitespace().last())
        .and_then(|value| u32::from_str_radix(value.trim_start_matches("0x"), 16).ok())
        .map(|uses_light| uses_light == 0)
}
