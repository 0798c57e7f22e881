//! Global settings schema, validation and the textual `key=value` form.
//!
//! The same text is used for the settings file (with `//` comments) and for
//! the settings wire message (comments stripped). Parsing is forgiving
//! line-by-line: a bad line is rejected and reported, the rest still apply.

use natgrav_types::{clamp_radius, clamp_strength};

use crate::error::ValidationError;

/// Separator between key and value in the file and wire forms.
pub const FILE_SEPARATOR: char = '=';

/// Prefix of a comment, either a full line or trailing a data line.
const COMMENT_PREFIX: &str = "//";

/// Value of `asteroid_prefix` that disables auto-creation.
const PREFIX_DISABLED: &str = "null";

/// Names of every configurable setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    /// `affect_ships`
    AffectShips,
    /// `mass_limit`
    MassLimit,
    /// `mass_divide`
    MassDivide,
    /// `jetpack`
    Jetpack,
    /// `jetpack_hover`
    JetpackHover,
    /// `notify`
    Notify,
    /// `asteroid_prefix`
    AsteroidPrefix,
    /// `asteroid_maxsize`
    AsteroidMaxsize,
    /// `radius_min`
    RadiusMin,
    /// `radius_max`
    RadiusMax,
    /// `strength_min`
    StrengthMin,
    /// `strength_max`
    StrengthMax,
}

impl SettingKey {
    /// Every key, in serialisation order.
    pub const ALL: [Self; 12] = [
        Self::AffectShips,
        Self::MassLimit,
        Self::MassDivide,
        Self::Jetpack,
        Self::JetpackHover,
        Self::Notify,
        Self::AsteroidPrefix,
        Self::AsteroidMaxsize,
        Self::RadiusMin,
        Self::RadiusMax,
        Self::StrengthMin,
        Self::StrengthMax,
    ];

    /// The key as written in the file.
    pub const fn name(self) -> &'static str {
        match self {
            Self::AffectShips => "affect_ships",
            Self::MassLimit => "mass_limit",
            Self::MassDivide => "mass_divide",
            Self::Jetpack => "jetpack",
            Self::JetpackHover => "jetpack_hover",
            Self::Notify => "notify",
            Self::AsteroidPrefix => "asteroid_prefix",
            Self::AsteroidMaxsize => "asteroid_maxsize",
            Self::RadiusMin => "radius_min",
            Self::RadiusMax => "radius_max",
            Self::StrengthMin => "strength_min",
            Self::StrengthMax => "strength_max",
        }
    }

    /// Look up a key by name, ignoring ASCII case and surrounding spaces.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|key| key.name().eq_ignore_ascii_case(name))
    }
}

impl core::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// The replicated, admin-tunable options.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSettings {
    /// Whether ships and other movable bodies are pulled at all.
    pub affect_ships: bool,
    /// Mass above this limit is ignored or divided. 0 disables.
    pub mass_limit: i32,
    /// Divisor for mass above `mass_limit`. 0 disables.
    pub mass_divide: i32,
    /// Percent of gravity applied to a jetpacking observer. 0 disables.
    pub jetpack: i32,
    /// Ignore a jetpacking observer whose dampeners are on.
    pub jetpack_hover: bool,
    /// Show enter/leave notifications.
    pub notify: bool,
    /// Storage-name prefixes that receive a field automatically. `None`
    /// disables auto-creation.
    pub asteroid_prefix: Option<Vec<String>>,
    /// Reference size at which derived fields reach `radius_max` and
    /// `strength_max`.
    pub asteroid_maxsize: i32,
    /// Smallest radius assigned to a derived field.
    pub radius_min: i32,
    /// Largest radius assigned to a derived field.
    pub radius_max: i32,
    /// Smallest strength assigned to a derived field.
    pub strength_min: f32,
    /// Largest strength assigned to a derived field.
    pub strength_max: f32,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            affect_ships: true,
            mass_limit: 200_000,
            mass_divide: 10,
            jetpack: 100,
            jetpack_hover: false,
            notify: true,
            asteroid_prefix: Some(vec!["gravity_".to_owned()]),
            asteroid_maxsize: 4096,
            radius_min: 1000,
            radius_max: 50_000,
            strength_min: 0.01,
            strength_max: 1.0,
        }
    }
}

/// Result of parsing a whole settings text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSettings {
    /// The settings with every accepted line applied.
    pub settings: GlobalSettings,
    /// Lines that were rejected, in order.
    pub rejected: Vec<ValidationError>,
}

impl GlobalSettings {
    /// Parse a settings text on top of the defaults.
    pub fn from_text(text: &str) -> ParsedSettings {
        let mut settings = Self::default();
        let rejected = settings.apply_text(text);
        ParsedSettings { settings, rejected }
    }

    /// Apply every data line of `text` on top of the current values.
    ///
    /// Blank lines and `//` comments are skipped, trailing comments are
    /// stripped. Returns the rejected lines; accepted lines stay applied.
    pub fn apply_text(&mut self, text: &str) -> Vec<ValidationError> {
        text.lines()
            .filter_map(strip_comment)
            .filter_map(|line| self.apply_line(line, FILE_SEPARATOR).err())
            .collect()
    }

    /// Apply a single `key<separator>value` line.
    ///
    /// Returns the key and the value as it now reads.
    pub fn apply_line(
        &mut self,
        line: &str,
        separator: char,
    ) -> Result<(SettingKey, String), ValidationError> {
        let (name, value) =
            line.trim()
                .split_once(separator)
                .ok_or_else(|| ValidationError::MalformedLine {
                    line: line.trim().to_owned(),
                })?;
        if value.contains(FILE_SEPARATOR) {
            return Err(ValidationError::MalformedLine {
                line: line.trim().to_owned(),
            });
        }
        self.set_by_name(name, value)
    }

    /// Set a setting by its name.
    pub fn set_by_name(
        &mut self,
        name: &str,
        raw: &str,
    ) -> Result<(SettingKey, String), ValidationError> {
        let key = SettingKey::from_name(name).ok_or_else(|| ValidationError::UnknownSetting {
            key: name.trim().to_owned(),
        })?;
        self.set(key, raw).map(|value| (key, value))
    }

    /// Parse `raw` for `key`, clamp it where the key has bounds and store it.
    ///
    /// On success the stored value is echoed back in its textual form. On
    /// failure nothing changes.
    pub fn set(&mut self, key: SettingKey, raw: &str) -> Result<String, ValidationError> {
        let value = raw.trim();
        match key {
            SettingKey::AffectShips => self.affect_ships = parse_bool(key, value)?,
            SettingKey::MassLimit => self.mass_limit = parse_int(key, value)?,
            SettingKey::MassDivide => self.mass_divide = parse_int(key, value)?,
            SettingKey::Jetpack => self.jetpack = parse_int(key, value)?,
            SettingKey::JetpackHover => self.jetpack_hover = parse_bool(key, value)?,
            SettingKey::Notify => self.notify = parse_bool(key, value)?,
            SettingKey::AsteroidPrefix => self.asteroid_prefix = parse_prefixes(key, value)?,
            SettingKey::AsteroidMaxsize => self.asteroid_maxsize = parse_int(key, value)?,
            SettingKey::RadiusMin => self.radius_min = parse_radius(key, value)?,
            SettingKey::RadiusMax => self.radius_max = parse_radius(key, value)?,
            SettingKey::StrengthMin => self.strength_min = parse_strength(key, value)?,
            SettingKey::StrengthMax => self.strength_max = parse_strength(key, value)?,
        }
        Ok(self.value_text(key))
    }

    /// The textual form of one value, exactly as [`serialize`] writes it.
    ///
    /// [`serialize`]: GlobalSettings::serialize
    pub fn value_text(&self, key: SettingKey) -> String {
        match key {
            SettingKey::AffectShips => self.affect_ships.to_string(),
            SettingKey::MassLimit => self.mass_limit.to_string(),
            SettingKey::MassDivide => self.mass_divide.to_string(),
            SettingKey::Jetpack => self.jetpack.to_string(),
            SettingKey::JetpackHover => self.jetpack_hover.to_string(),
            SettingKey::Notify => self.notify.to_string(),
            SettingKey::AsteroidPrefix => self
                .asteroid_prefix
                .as_ref()
                .map_or_else(|| PREFIX_DISABLED.to_owned(), |list| list.join(", ")),
            SettingKey::AsteroidMaxsize => self.asteroid_maxsize.to_string(),
            SettingKey::RadiusMin => self.radius_min.to_string(),
            SettingKey::RadiusMax => self.radius_max.to_string(),
            SettingKey::StrengthMin => self.strength_min.to_string(),
            SettingKey::StrengthMax => self.strength_max.to_string(),
        }
    }

    /// Render the settings as `key=value` lines.
    ///
    /// With `with_comments` every key is preceded by its explanation, which
    /// is the form written to the settings file. Without comments the text
    /// is what travels on the settings channel.
    pub fn serialize(&self, with_comments: bool) -> String {
        let defaults = Self::default();
        let mut out = String::new();

        if with_comments {
            out.push_str("// Natural Gravity settings. Lines starting with // are comments.\n");
            out.push_str("// The file is re-written after every load so comments and keys stay current.\n");
        }

        for key in SettingKey::ALL {
            if with_comments {
                out.push('\n');
                for line in key_help(key, &defaults) {
                    out.push_str(COMMENT_PREFIX);
                    out.push(' ');
                    out.push_str(&line);
                    out.push('\n');
                }
            }
            out.push_str(key.name());
            out.push(FILE_SEPARATOR);
            out.push_str(&self.value_text(key));
            out.push('\n');
        }

        out.trim().to_owned()
    }

    /// Whether an asteroid storage name starts with any configured prefix,
    /// ignoring case.
    pub fn matches_asteroid_prefix(&self, storage_name: &str) -> bool {
        let name = storage_name.to_lowercase();
        self.asteroid_prefix.as_ref().is_some_and(|prefixes| {
            prefixes
                .iter()
                .any(|prefix| name.starts_with(&prefix.to_lowercase()))
        })
    }
}

/// Explanation lines written above a key in the settings file.
fn key_help(key: SettingKey, defaults: &GlobalSettings) -> Vec<String> {
    let default = defaults.value_text(key);
    match key {
        SettingKey::AffectShips => vec![format!(
            "Whether ships are pulled by natural gravity; default: {default}"
        )],
        SettingKey::MassLimit => vec![
            "Ship mass above this limit is ignored, or divided by mass_divide.".to_owned(),
            format!("0 disables the limit; default: {default}"),
        ],
        SettingKey::MassDivide => vec![
            "Mass above mass_limit is divided by this number:".to_owned(),
            "  mass > mass_limit: mass_limit + (mass - mass_limit) / mass_divide".to_owned(),
            format!("0 disables dividing; default: {default}"),
        ],
        SettingKey::Jetpack => vec![
            "Percent of gravity applied to players flying with a jetpack.".to_owned(),
            format!("0 disables, values above 100 are allowed; default: {default}"),
        ],
        SettingKey::JetpackHover => vec![format!(
            "Ignore jetpacking players whose dampeners are on; default: {default}"
        )],
        SettingKey::Notify => vec![format!(
            "Notify players when entering or leaving a field; default: {default}"
        )],
        SettingKey::AsteroidPrefix => vec![
            "Asteroids whose name starts with one of these prefixes get gravity automatically.".to_owned(),
            "Case does not matter, separate several prefixes with commas.".to_owned(),
            format!("Set to {PREFIX_DISABLED} to disable; default: {default}"),
        ],
        SettingKey::AsteroidMaxsize => vec![
            "Boundary size at which radius_max and strength_max are reached.".to_owned(),
            format!("default: {default}"),
        ],
        SettingKey::RadiusMin | SettingKey::RadiusMax => vec![
            "Radius of a created field: (size / asteroid_maxsize) * radius_max,".to_owned(),
            format!(
                "kept between radius_min and radius_max; limited to {}..{}; default: {default}",
                natgrav_types::constants::RADIUS_MIN,
                natgrav_types::constants::RADIUS_MAX
            ),
        ],
        SettingKey::StrengthMin | SettingKey::StrengthMax => vec![
            "Strength in G of a created field: (size / asteroid_maxsize) * strength_max,".to_owned(),
            format!(
                "kept between strength_min and strength_max; limited to {}..{}; default: {default}",
                natgrav_types::constants::STRENGTH_MIN,
                natgrav_types::constants::STRENGTH_MAX
            ),
        ],
    }
}

/// Trim a line and drop comments. `None` for lines with no data.
fn strip_comment(line: &str) -> Option<&str> {
    let data = line
        .split_once(COMMENT_PREFIX)
        .map_or(line, |(data, _comment)| data)
        .trim();
    (!data.is_empty()).then_some(data)
}

fn invalid(key: SettingKey, value: &str) -> ValidationError {
    ValidationError::InvalidValue {
        key: key.name().to_owned(),
        value: value.to_owned(),
    }
}

fn parse_bool(key: SettingKey, value: &str) -> Result<bool, ValidationError> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(invalid(key, value))
    }
}

fn parse_int(key: SettingKey, value: &str) -> Result<i32, ValidationError> {
    value.parse().map_err(|_err| invalid(key, value))
}

fn parse_radius(key: SettingKey, value: &str) -> Result<i32, ValidationError> {
    let raw: i64 = value.parse().map_err(|_err| invalid(key, value))?;
    Ok(clamp_radius(raw))
}

fn parse_strength(key: SettingKey, value: &str) -> Result<f32, ValidationError> {
    let raw: f32 = value.parse().map_err(|_err| invalid(key, value))?;
    if !raw.is_finite() {
        return Err(invalid(key, value));
    }
    Ok(clamp_strength(raw))
}

/// Entries holding a separator or a comment marker would not read back
/// from the settings file, so they are rejected.
fn parse_prefixes(key: SettingKey, value: &str) -> Result<Option<Vec<String>>, ValidationError> {
    if value == PREFIX_DISABLED {
        return Ok(None);
    }
    if value.contains(COMMENT_PREFIX) || value.contains(FILE_SEPARATOR) {
        return Err(invalid(key, value));
    }
    Ok(Some(
        value
            .split(',')
            .map(str::trim)
            .filter(|prefix| !prefix.is_empty())
            .map(str::to_owned)
            .collect(),
    ))
}
