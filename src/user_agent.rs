//! Realistic desktop browser user-agent strings.

const PLATFORMS: &[&str] = &[
    "Windows NT 10.0; Win64; x64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "X11; Linux x86_64",
    "X11; Ubuntu; Linux x86_64",
];

/// Picks a platform and browser at random and fills in a plausible version.
pub fn random_user_agent() -> String {
    random_user_agent_with(&mut fastrand::Rng::new())
}

pub(crate) fn random_user_agent_with(rng: &mut fastrand::Rng) -> String {
    let platform = PLATFORMS[rng.usize(..PLATFORMS.len())];
    match rng.u8(0..3) {
        0 => {
            let major = rng.u16(118..=131);
            format!(
                "Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) \
                 Chrome/{major}.0.{}.{} Safari/537.36",
                rng.u16(5000..6800),
                rng.u16(0..200)
            )
        }
        1 => {
            let major = rng.u16(115..=132);
            let gecko_platform =
                platform.replace("Intel Mac OS X 10_15_7", "Intel Mac OS X 10.15");
            format!(
                "Mozilla/5.0 ({gecko_platform}; rv:{major}.0) Gecko/20100101 Firefox/{major}.0"
            )
        }
        _ => {
            let major = rng.u16(118..=131);
            let build = rng.u16(2000..2900);
            format!(
                "Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) \
                 Chrome/{major}.0.0.0 Safari/537.36 Edg/{major}.0.{build}.{}",
                rng.u16(0..100)
            )
        }
    }
}
