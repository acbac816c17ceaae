//! 协议子类型编码。
//!
//! 同一个线协议字段（第 5 字段）在不同消息类型下含义不同：
//! INTERNAL 消息为 [`InternalSubtype`]，PRESENTATION 消息为
//! [`PresentationCode`]，SET/REQ 消息为 [`VariableKind`]。
//! 三者数值空间相互重叠，解释时必须结合消息类型。

/// INTERNAL 消息子类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalSubtype {
    BatteryLevel = 0,
    Time = 1,
    Version = 2,
    IdRequest = 3,
    IdResponse = 4,
    InclusionMode = 5,
    Config = 6,
    FindParent = 7,
    FindParentResponse = 8,
    LogMessage = 9,
    Children = 10,
    SketchName = 11,
    SketchVersion = 12,
    Reboot = 13,
    GatewayReady = 14,
    SigningPresentation = 15,
    NonceRequest = 16,
    NonceResponse = 17,
    HeartbeatRequest = 18,
    Presentation = 19,
    DiscoverRequest = 20,
    DiscoverResponse = 21,
    HeartbeatResponse = 22,
    Locked = 23,
    Ping = 24,
    Pong = 25,
    RegistrationRequest = 26,
    RegistrationResponse = 27,
    Debug = 28,
}

impl InternalSubtype {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// 设备类别标签（PRESENTATION 消息子类型）。
///
/// 封闭枚举：未知编码不可构造，呈现消息携带未知类别时静默丢弃。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentationCode {
    Door = 0,
    Motion = 1,
    Smoke = 2,
    Binary = 3,
    Dimmer = 4,
    Cover = 5,
    Temp = 6,
    Hum = 7,
    Baro = 8,
    Wind = 9,
    Rain = 10,
    Uv = 11,
    Weight = 12,
    Power = 13,
    Heater = 14,
    Distance = 15,
    LightLevel = 16,
    ArduinoNode = 17,
    ArduinoRepeaterNode = 18,
    Lock = 19,
    Ir = 20,
    Water = 21,
    AirQuality = 22,
    Custom = 23,
    Dust = 24,
    SceneController = 25,
    RgbLight = 26,
    RgbwLight = 27,
    ColorSensor = 28,
    Hvac = 29,
    Multimeter = 30,
    Sprinkler = 31,
    WaterLeak = 32,
    Sound = 33,
    Vibration = 34,
    Moisture = 35,
    Info = 36,
    Gas = 37,
    Gps = 38,
    WaterQuality = 39,
}

impl PresentationCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Door),
            1 => Some(Self::Motion),
            2 => Some(Self::Smoke),
            3 => Some(Self::Binary),
            4 => Some(Self::Dimmer),
            5 => Some(Self::Cover),
            6 => Some(Self::Temp),
            7 => Some(Self::Hum),
            8 => Some(Self::Baro),
            9 => Some(Self::Wind),
            10 => Some(Self::Rain),
            11 => Some(Self::Uv),
            12 => Some(Self::Weight),
            13 => Some(Self::Power),
            14 => Some(Self::Heater),
            15 => Some(Self::Distance),
            16 => Some(Self::LightLevel),
            17 => Some(Self::ArduinoNode),
            18 => Some(Self::ArduinoRepeaterNode),
            19 => Some(Self::Lock),
            20 => Some(Self::Ir),
            21 => Some(Self::Water),
            22 => Some(Self::AirQuality),
            23 => Some(Self::Custom),
            24 => Some(Self::Dust),
            25 => Some(Self::SceneController),
            26 => Some(Self::RgbLight),
            27 => Some(Self::RgbwLight),
            28 => Some(Self::ColorSensor),
            29 => Some(Self::Hvac),
            30 => Some(Self::Multimeter),
            31 => Some(Self::Sprinkler),
            32 => Some(Self::WaterLeak),
            33 => Some(Self::Sound),
            34 => Some(Self::Vibration),
            35 => Some(Self::Moisture),
            36 => Some(Self::Info),
            37 => Some(Self::Gas),
            38 => Some(Self::Gps),
            39 => Some(Self::WaterQuality),
            _ => None,
        }
    }

    /// 该设备类别声明的变量槽位（不含所有子设备共有的 V_VAR1..V_VAR5）。
    ///
    /// 数据驱动表：每个类别对应一组固定的变量子类型。
    pub fn variables(self) -> &'static [VariableKind] {
        use VariableKind::*;
        match self {
            Self::Door | Self::Motion | Self::Smoke | Self::WaterLeak => &[Tripped, Armed],
            Self::Binary => &[Status, Watt],
            Self::Dimmer => &[Status, Percentage, Watt],
            Self::Cover => &[Up, Down, Stop, Percentage, Status],
            Self::Temp => &[Temp, Id],
            Self::Hum => &[Hum],
            Self::Baro => &[Pressure, Forecast],
            Self::Wind => &[Wind, Gust, Direction],
            Self::Rain => &[Rain, RainRate],
            Self::Uv => &[Uv],
            Self::Weight => &[Weight, Impedance],
            Self::Power => &[Watt, Kwh, Var, Va, PowerFactor],
            Self::Heater => &[HvacSetpointHeat, HvacFlowState, Temp, Status],
            Self::Distance => &[Distance, UnitPrefix],
            Self::LightLevel => &[LightLevel, Level],
            Self::ArduinoNode | Self::ArduinoRepeaterNode => &[],
            Self::Lock => &[LockStatus],
            Self::Ir => &[IrSend, IrReceive, IrRecord],
            Self::Water => &[Flow, Volume],
            Self::AirQuality | Self::Dust => &[Level, UnitPrefix],
            Self::Custom => &[Custom],
            Self::SceneController => &[SceneOn, SceneOff],
            Self::RgbLight => &[Rgb, Watt, Percentage, Status],
            Self::RgbwLight => &[Rgbw, Watt, Percentage, Status],
            Self::ColorSensor => &[Rgb],
            Self::Hvac => &[
                Status,
                Temp,
                HvacSetpointHeat,
                HvacSetpointCool,
                HvacFlowState,
                HvacFlowMode,
                HvacSpeed,
                Percentage,
            ],
            Self::Multimeter => &[Voltage, Current, Impedance],
            Self::Sprinkler => &[Status, Tripped],
            Self::Sound | Self::Vibration | Self::Moisture => &[Level, Tripped, Armed],
            Self::Info => &[Text],
            Self::Gas => &[Flow, Volume],
            Self::Gps => &[Position],
            Self::WaterQuality => &[Temp, Ph, Orp, Ec, Status],
        }
    }
}

/// 变量子类型（SET/REQ 消息子类型）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Temp = 0,
    Hum = 1,
    Status = 2,
    Percentage = 3,
    Pressure = 4,
    Forecast = 5,
    Rain = 6,
    RainRate = 7,
    Wind = 8,
    Gust = 9,
    Direction = 10,
    Uv = 11,
    Weight = 12,
    Distance = 13,
    Impedance = 14,
    Armed = 15,
    Tripped = 16,
    Watt = 17,
    Kwh = 18,
    SceneOn = 19,
    SceneOff = 20,
    HvacFlowState = 21,
    HvacSpeed = 22,
    LightLevel = 23,
    Var1 = 24,
    Var2 = 25,
    Var3 = 26,
    Var4 = 27,
    Var5 = 28,
    Up = 29,
    Down = 30,
    Stop = 31,
    IrSend = 32,
    IrReceive = 33,
    Flow = 34,
    Volume = 35,
    LockStatus = 36,
    Level = 37,
    Voltage = 38,
    Current = 39,
    Rgb = 40,
    Rgbw = 41,
    Id = 42,
    UnitPrefix = 43,
    HvacSetpointCool = 44,
    HvacSetpointHeat = 45,
    HvacFlowMode = 46,
    Text = 47,
    Custom = 48,
    Position = 49,
    IrRecord = 50,
    Ph = 51,
    Orp = 52,
    Ec = 53,
    Var = 54,
    Va = 55,
    PowerFactor = 56,
}

impl VariableKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// 所有子设备无条件携带的五个通用槽位。
    pub const COMMON: [VariableKind; 5] = [
        VariableKind::Var1,
        VariableKind::Var2,
        VariableKind::Var3,
        VariableKind::Var4,
        VariableKind::Var5,
    ];
}
