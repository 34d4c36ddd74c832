/// Operating mode as exposed to the platform. The vendor encodes this as a
/// power flag plus an integer status code; see the table methods below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
    FanOnly,
}

impl HvacMode {
    /// Status codes observed across floor-heating (dev_type 8) and fan-coil
    /// (dev_type 14) hardware. Only meaningful when the unit is powered on.
    pub fn from_status(code: i64) -> Option<Self> {
        match code {
            2 | 4 | 7 => Some(HvacMode::Heat),
            1 => Some(HvacMode::Cool),
            5 => Some(HvacMode::FanOnly),
            _ => None,
        }
    }

    /// Status code sent when switching a powered-on unit into this mode.
    /// Off has no code; it travels through the on/off flag instead.
    pub fn as_status(&self) -> Option<i64> {
        match self {
            HvacMode::Heat => Some(7),
            HvacMode::Cool => Some(1),
            HvacMode::FanOnly => Some(5),
            HvacMode::Off => None,
        }
    }

    pub fn as_name(&self) -> &'static str {
        match self {
            HvacMode::Off => "off",
            HvacMode::Heat => "heat",
            HvacMode::Cool => "cool",
            HvacMode::FanOnly => "fan_only",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "off" => Some(HvacMode::Off),
            "heat" => Some(HvacMode::Heat),
            "cool" => Some(HvacMode::Cool),
            "fan_only" => Some(HvacMode::FanOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanMode {
    Auto,
    Low,
    Medium,
    High,
}

impl FanMode {
    pub fn from_vendor_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(FanMode::Auto),
            3 => Some(FanMode::Low),
            4 => Some(FanMode::Medium),
            5 => Some(FanMode::High),
            _ => None,
        }
    }

    pub fn as_vendor_code(&self) -> i64 {
        match self {
            FanMode::Auto => 0,
            FanMode::Low => 3,
            FanMode::Medium => 4,
            FanMode::High => 5,
        }
    }

    pub fn as_name(&self) -> &'static str {
        match self {
            FanMode::Auto => "auto",
            FanMode::Low => "low",
            FanMode::Medium => "medium",
            FanMode::High => "high",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(FanMode::Auto),
            "low" => Some(FanMode::Low),
            "medium" => Some(FanMode::Medium),
            "high" => Some(FanMode::High),
            _ => None,
        }
    }
}

/// Selects which of the parallel `temp_heat`/`temp_cool` field sets is
/// authoritative for a device's target temperature and bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveModeKey {
    Heat,
    Cool,
}

impl ActiveModeKey {
    pub fn as_field_key(&self) -> &'static str {
        match self {
            ActiveModeKey::Heat => "heat",
            ActiveModeKey::Cool => "cool",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginType {
    Email,
    Mobile,
}

impl LoginType {
    pub fn as_oauth_type(&self) -> &'static str {
        match self {
            LoginType::Email => "email",
            LoginType::Mobile => "mobile",
        }
    }
}

/// Operator-supplied capability overrides. `None` defers to the vendor's
/// `dirty_*` flags; `Some` wins unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityOverrides {
    pub fan: Option<bool>,
    pub cool: Option<bool>,
    pub heat: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct House {
    pub house_id: String,
    pub name: String,
}

/// House/group metadata merged into each device record during a refresh.
#[derive(Debug, Clone, Default)]
pub struct Placement {
    pub house_id: String,
    pub house_name: String,
    pub group_id: String,
    pub group_name: String,
}

/// Normalized state of one physical unit. Rebuilt wholesale on every
/// refresh; state fields stay `None` on a partial record whose status blob
/// could not be decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceRecord {
    pub mac: String,
    pub name: String,
    pub house_id: String,
    pub house_name: String,
    pub group_id: String,
    pub group_name: String,
    pub supports_fan: bool,
    pub supports_heat: bool,
    pub supports_cool: bool,
    pub hvac_mode: Option<HvacMode>,
    /// Present only when `supports_fan` is true.
    pub fan_mode: Option<FanMode>,
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub available: bool,
    pub active_mode_key: Option<ActiveModeKey>,
}

impl DeviceRecord {
    // Optimistic local updates applied after the vendor acknowledges a
    // command. The vendor does not echo the new state; the next refresh
    // reconciles any divergence.

    pub fn apply_hvac_mode(&mut self, mode: HvacMode) {
        self.hvac_mode = Some(mode);
    }

    pub fn apply_target_temperature(&mut self, value: f64) {
        self.target_temperature = Some(value);
    }

    pub fn apply_fan_mode(&mut self, mode: FanMode) {
        self.fan_mode = Some(mode);
    }
}
