//! Known Connect IQ device targets.
//!
//! The toolchain is the authority on which targets exist; this list only
//! feeds `ciqx devices` and friendlier messages.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Device {
    pub id: &'static str,
    pub name: &'static str,
    pub resolution: &'static str,
    pub display_type: &'static str,
}

pub const DEVICES: &[Device] = &[
    Device {
        id: "fenix7",
        name: "fēnix 7",
        resolution: "260×260",
        display_type: "MIP",
    },
    Device {
        id: "fenix7s",
        name: "fēnix 7S",
        resolution: "240×240",
        display_type: "MIP",
    },
    Device {
        id: "venu2",
        name: "Venu 2",
        resolution: "416×416",
        display_type: "AMOLED",
    },
    Device {
        id: "vivoactive4",
        name: "Vívoactive 4",
        resolution: "260×260",
        display_type: "MIP",
    },
    Device {
        id: "epix2",
        name: "Epix (Gen 2)",
        resolution: "416×416",
        display_type: "AMOLED",
    },
];

pub fn find(id: &str) -> Option<&'static Device> {
    DEVICES.iter().find(|d| d.id == id)
}
