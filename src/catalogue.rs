//! The catalogue of persisted variables.
//!
//! The position of an entry is its virtual address in the record storage. New entries are only
//! appended to the end of the regular list; nothing is reordered or removed, otherwise records
//! written by older firmware are read back into the wrong variable. The static list is frozen,
//! its `*Reserved*` placeholders are renamed when a calibration constant is added.

use crate::error::Error;
use strum::{EnumCount, IntoEnumIterator};

/// Virtual address of the initialization marker, outside of the catalogue range.
pub const INIT_MARKER_ADDRESS: u16 = 0x00FF;

/// Payload of the initialization marker record.
pub const INIT_MARKER: u8 = 0xA5;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Region {
    /// Calibration constants. Survive a factory reset.
    Static,
    /// Settings. Restored to their default on factory reset.
    Regular,
}

macro_rules! catalogue {
    (
        static: { $($static_id:ident = $static_default:expr),* $(,)? }
        regular: { $($regular_id:ident = $regular_default:expr),* $(,)? }
    ) => {
        /// Identifies one persisted variable. The discriminant is its virtual address.
        #[derive(
            Copy,
            Clone,
            Debug,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            strum::EnumCount,
            strum::EnumIter,
            strum::FromRepr,
            strum::IntoStaticStr,
        )]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[repr(u16)]
        pub enum VariableId {
            $($static_id,)*
            $($regular_id,)*
        }

        const DEFAULTS: [u8; VariableId::COUNT] = [$($static_default,)* $($regular_default,)*];

        const STATIC_COUNT: usize = [$(stringify!($static_id)),*].len();
    };
}

catalogue! {
    static: {
        NvStaticStartId = 0x00,
        NvStaticAddrReserved0 = 0x00,
        // current measurement calibration coefficients
        VdgIloadCalibKta = 0x00,
        VdgIloadCalibKtb = 0x00,
        ResIloadCalibZero = 0x00,
        NvStaticAddrReserved1 = 0x00,
        NvStaticAddrReserved2 = 0x00,
        NvStaticAddrReserved3 = 0x00,
        NvStaticAddrReserved4 = 0x00,
        NvStaticAddrReserved5 = 0x00,
        NvStaticAddrReserved6 = 0x00,
        NvStaticAddrReserved7 = 0x00,
        NvStaticAddrReserved8 = 0x00,
        NvStaticAddrReserved9 = 0x00,
        NvStaticAddrReserved10 = 0x00,
        NvStaticAddrReserved11 = 0x00,
        NvStaticAddrReserved12 = 0x00,
    }
    regular: {
        NvStartId = 0x00,
        NvAddrReserved0 = 0x00,
        BatProfile = 0xF0,
        BatCapacity = 0x00,
        ChargeCurrent = 0x00,
        ChargeTermCurrent = 0x00,
        BatRegVoltage = 0x00,
        BatCutoffVoltage = 0x00,
        BatTempCold = 0x00,
        BatTempCool = 0x0A,
        BatTempWarm = 0x2D,
        BatTempHot = 0x3C,
        BatNtcB = 0x00,
        BatNtcResistance = 0x00,
        BatNtcCrc = 0x00,
        FuelGaugeConfig = 0x00,
        ChargingConfig = 0x01,
        ChargerInputsConfig = 0x00,
        WatchdogConfigL = 0x00,
        NvAddrReserved5 = 0x00,
        ButtonPressFuncSw1 = 0x00,
        ButtonPressConfigSw1 = 0x00,
        ButtonReleaseFuncSw1 = 0x00,
        ButtonReleaseConfigSw1 = 0x00,
        ButtonSinglePressFuncSw1 = 0x00,
        ButtonSinglePressConfigSw1 = 0x00,
        ButtonDoublePressFuncSw1 = 0x00,
        ButtonDoublePressConfigSw1 = 0x00,
        ButtonLongPress1FuncSw1 = 0x00,
        ButtonLongPress1ConfigSw1 = 0x00,
        ButtonLongPress2FuncSw1 = 0x00,
        ButtonLongPress2ConfigSw1 = 0x00,
        WakeupOnChargeConfig = 0x7F,
        ButtonPressFuncSw2 = 0x00,
        ButtonPressConfigSw2 = 0x00,
        ButtonReleaseFuncSw2 = 0x00,
        ButtonReleaseConfigSw2 = 0x00,
        ButtonSinglePressFuncSw2 = 0x00,
        ButtonSinglePressConfigSw2 = 0x00,
        ButtonDoublePressFuncSw2 = 0x00,
        ButtonDoublePressConfigSw2 = 0x00,
        ButtonLongPress1FuncSw2 = 0x00,
        ButtonLongPress1ConfigSw2 = 0x00,
        ButtonLongPress2FuncSw2 = 0x00,
        ButtonLongPress2ConfigSw2 = 0x00,
        NvAddrReserved7 = 0x00,
        ButtonPressFuncSw3 = 0x00,
        ButtonPressConfigSw3 = 0x00,
        ButtonReleaseFuncSw3 = 0x00,
        ButtonReleaseConfigSw3 = 0x00,
        ButtonSinglePressFuncSw3 = 0x00,
        ButtonSinglePressConfigSw3 = 0x00,
        ButtonDoublePressFuncSw3 = 0x00,
        ButtonDoublePressConfigSw3 = 0x00,
        ButtonLongPress1FuncSw3 = 0x00,
        ButtonLongPress1ConfigSw3 = 0x00,
        ButtonLongPress2FuncSw3 = 0x00,
        ButtonLongPress2ConfigSw3 = 0x00,
        NvAddrReserved8 = 0x00,
        LedFunc1 = 0x01,
        LedParamR1 = 0x3C,
        LedParamG1 = 0x3C,
        LedParamB1 = 0x64,
        LedFunc2 = 0x02,
        LedParamR2 = 0x3C,
        LedParamG2 = 0x3C,
        LedParamB2 = 0x64,
        NvAddrReserved9 = 0x00,
        NvAddrReserved10 = 0x00,
        PowerRegulatorConfig = 0x00,
        RunPinConfig = 0x00,
        NvAddrReserved11 = 0x00,
        OwnAddress1 = 0x14,
        OwnAddress2 = 0x68,
        IdEepromAdr = 0x50,
        NvAddrReserved12 = 0x00,
        IoConfig1 = 0x00,
        IoConfig1Param1 = 0x00,
        IoConfig1Param2 = 0x00,
        IoConfig2 = 0x00,
        IoConfig2Param1 = 0x00,
        IoConfig2Param2 = 0x00,
        NvAddrReserved13 = 0x00,
        BatChemistry = 0x00,
        BatOcv10L = 0x00,
        BatOcv10H = 0x00,
        BatOcv50L = 0x00,
        BatOcv50H = 0x00,
        BatOcv90L = 0x00,
        BatOcv90H = 0x00,
        BatR10L = 0x00,
        BatR10H = 0x00,
        BatR50L = 0x00,
        BatR50H = 0x00,
        BatR90L = 0x00,
        BatR90H = 0x00,
        WatchdogConfigH = 0x00,
        IsenseResSpanL = 0x00,
        IsenseResSpanH = 0x00,
    }
}

const _: () = assert!(
    VariableId::COUNT < INIT_MARKER_ADDRESS as usize,
    "catalogue overlaps the init marker"
);

impl VariableId {
    /// Virtual address of the variable's record.
    pub const fn address(self) -> u16 {
        self as u16
    }

    pub const fn default_value(self) -> u8 {
        DEFAULTS[self as usize]
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn region(self) -> Region {
        if self.is_static() {
            Region::Static
        } else {
            Region::Regular
        }
    }

    pub const fn is_static(self) -> bool {
        (self as usize) < STATIC_COUNT
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    /// All variables in address order.
    pub fn all() -> impl Iterator<Item = VariableId> {
        <Self as IntoEnumIterator>::iter()
    }

    /// Variables restored by a factory reset.
    pub fn regular() -> impl Iterator<Item = VariableId> {
        Self::all().filter(|id| !id.is_static())
    }
}

impl TryFrom<u16> for VariableId {
    type Error = Error;

    fn try_from(address: u16) -> Result<Self, Self::Error> {
        VariableId::from_repr(address).ok_or(Error::UnknownVariable)
    }
}
