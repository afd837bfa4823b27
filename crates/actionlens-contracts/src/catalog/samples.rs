#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleImage {
    pub action: &'static str,
    pub url: &'static str,
    pub alt: &'static str,
}

impl SampleImage {
    /// Name given to the downloaded upload, e.g. `sample-biking.jpg`.
    pub fn file_name(&self) -> String {
        format!("sample-{}.jpg", self.action.to_lowercase())
    }
}

pub const SAMPLE_IMAGES: &[SampleImage] = &[
    SampleImage {
        action: "Biking",
        url: "https://images.unsplash.com/photo-1558618666-fcd25c85cd64?w=400&h=300&fit=crop",
        alt: "Person biking outdoors",
    },
    SampleImage {
        action: "Basketball",
        url: "https://images.unsplash.com/photo-1520341280432-4749d4d7bcf9?w=400&h=300&fit=crop",
        alt: "Person playing basketball",
    },
    SampleImage {
        action: "PlayingGuitar",
        url: "https://images.unsplash.com/photo-1510915361894-db8b60106cb1?w=400&h=300&fit=crop",
        alt: "Person playing guitar",
    },
    SampleImage {
        action: "Swimming",
        url: "https://images.unsplash.com/photo-1530549387789-4c1017266635?w=400&h=300&fit=crop",
        alt: "Person swimming in pool",
    },
];

pub fn find_sample(action: &str) -> Option<&'static SampleImage> {
    let needle = action.trim();
    SAMPLE_IMAGES
        .iter()
        .find(|sample| sample.action.eq_ignore_ascii_case(needle))
}
