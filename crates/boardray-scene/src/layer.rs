//! Board layer identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SceneError;

/// Number of inner copper layers a board may have.
pub const MAX_INNER_COPPER: u8 = 30;

/// Which face of the board a layer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Top face.
    Front,
    /// Bottom face.
    Back,
}

/// A board layer.
///
/// The variant order is the stacking order used when iterating layer maps:
/// copper from front to back, then the technical layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LayerId {
    /// `F.Cu`
    FrontCopper,
    /// `In1.Cu` to `In30.Cu`
    InnerCopper(u8),
    /// `B.Cu`
    BackCopper,
    /// `B.Adhes`
    BackAdhesive,
    /// `F.Adhes`
    FrontAdhesive,
    /// `B.Paste`
    BackPaste,
    /// `F.Paste`
    FrontPaste,
    /// `B.SilkS`
    BackSilkscreen,
    /// `F.SilkS`
    FrontSilkscreen,
    /// `B.Mask`
    BackMask,
    /// `F.Mask`
    FrontMask,
    /// `Dwgs.User`
    Drawings,
    /// `Cmts.User`
    Comments,
    /// `Eco1.User`
    Eco1,
    /// `Eco2.User`
    Eco2,
    /// `Edge.Cuts`
    EdgeCuts,
    /// `Margin`
    Margin,
    /// `B.CrtYd`
    BackCourtyard,
    /// `F.CrtYd`
    FrontCourtyard,
    /// `B.Fab`
    BackFab,
    /// `F.Fab`
    FrontFab,
}

impl LayerId {
    /// True for copper layers, inner ones included.
    pub fn is_copper(self) -> bool {
        matches!(
            self,
            Self::FrontCopper | Self::InnerCopper(_) | Self::BackCopper
        )
    }

    /// True for the two solder mask layers.
    pub fn is_mask(self) -> bool {
        matches!(self, Self::FrontMask | Self::BackMask)
    }

    /// True for the two solder paste layers.
    pub fn is_paste(self) -> bool {
        matches!(self, Self::FrontPaste | Self::BackPaste)
    }

    /// True for the two silkscreen layers.
    pub fn is_silkscreen(self) -> bool {
        matches!(self, Self::FrontSilkscreen | Self::BackSilkscreen)
    }

    /// Face of the board, for layers that have one.
    pub fn side(self) -> Option<Side> {
        match self {
            Self::FrontCopper
            | Self::FrontAdhesive
            | Self::FrontPaste
            | Self::FrontSilkscreen
            | Self::FrontMask
            | Self::FrontCourtyard
            | Self::FrontFab => Some(Side::Front),
            Self::BackCopper
            | Self::BackAdhesive
            | Self::BackPaste
            | Self::BackSilkscreen
            | Self::BackMask
            | Self::BackCourtyard
            | Self::BackFab => Some(Side::Back),
            _ => None,
        }
    }

    /// The solder mask layer on the same face as this silkscreen layer.
    pub fn silkscreen_mask(self) -> Option<LayerId> {
        match self {
            Self::FrontSilkscreen => Some(Self::FrontMask),
            Self::BackSilkscreen => Some(Self::BackMask),
            _ => None,
        }
    }

    /// Layer name as used in board files.
    pub fn name(self) -> String {
        match self {
            Self::InnerCopper(n) => format!("In{n}.Cu"),
            other => other.fixed_name().to_string(),
        }
    }

    fn fixed_name(self) -> &'static str {
        match self {
            Self::FrontCopper => "F.Cu",
            Self::InnerCopper(_) => "In.Cu",
            Self::BackCopper => "B.Cu",
            Self::BackAdhesive => "B.Adhes",
            Self::FrontAdhesive => "F.Adhes",
            Self::BackPaste => "B.Paste",
            Self::FrontPaste => "F.Paste",
            Self::BackSilkscreen => "B.SilkS",
            Self::FrontSilkscreen => "F.SilkS",
            Self::BackMask => "B.Mask",
            Self::FrontMask => "F.Mask",
            Self::Drawings => "Dwgs.User",
            Self::Comments => "Cmts.User",
            Self::Eco1 => "Eco1.User",
            Self::Eco2 => "Eco2.User",
            Self::EdgeCuts => "Edge.Cuts",
            Self::Margin => "Margin",
            Self::BackCourtyard => "B.CrtYd",
            Self::FrontCourtyard => "F.CrtYd",
            Self::BackFab => "B.Fab",
            Self::FrontFab => "F.Fab",
        }
    }

    const FIXED: [LayerId; 20] = [
        Self::FrontCopper,
        Self::BackCopper,
        Self::BackAdhesive,
        Self::FrontAdhesive,
        Self::BackPaste,
        Self::FrontPaste,
        Self::BackSilkscreen,
        Self::FrontSilkscreen,
        Self::BackMask,
        Self::FrontMask,
        Self::Drawings,
        Self::Comments,
        Self::Eco1,
        Self::Eco2,
        Self::EdgeCuts,
        Self::Margin,
        Self::BackCourtyard,
        Self::FrontCourtyard,
        Self::BackFab,
        Self::FrontFab,
    ];
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for LayerId {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(layer) = Self::FIXED.iter().find(|l| l.fixed_name() == s) {
            return Ok(*layer);
        }
        s.strip_prefix("In")
            .and_then(|rest| rest.strip_suffix(".Cu"))
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (1..=MAX_INNER_COPPER).contains(n))
            .map(Self::InnerCopper)
            .ok_or_else(|| SceneError::UnknownLayer(s.to_string()))
    }
}

impl TryFrom<String> for LayerId {
    type Error = SceneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LayerId> for String {
    fn from(layer: LayerId) -> Self {
        layer.name()
    }
}
