//! Android platform levels

use once_cell::sync::Lazy;
use regex::Regex;

use lydroid_core::LyDroidError;

/// Lowest platform SDK the generated project may target
pub const MIN_PLATFORM_SDK_API_LEVEL: u32 = 28;

/// Lowest native API level the NDK build may use
pub const MIN_NATIVE_API_LEVEL: u32 = 24;

static PLATFORM_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[A-Za-z]+-)?(?P<level>\d+)$").expect("platform pattern"));

/// Parse `33` or `android-33` and check it against `minimum`
pub fn parse_api_level(value: &str, argument: &str, minimum: u32) -> Result<u32, LyDroidError> {
    let level = PLATFORM_PATTERN
        .captures(value.trim())
        .and_then(|caps| caps.name("level"))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .ok_or_else(|| {
            LyDroidError::invalid_argument(format!(
                "Invalid value '{}' for {}. Expected a number such as '{}' or 'android-{}'",
                value, argument, minimum, minimum
            ))
        })?;

    if level < minimum {
        return Err(LyDroidError::invalid_argument(format!(
            "{} must be at least {} (got {})",
            argument, minimum, level
        )));
    }
    Ok(level)
}

/// SDK manager path of a platform package
pub fn platform_package(level: u32) -> String {
    format!("platforms;android-{}", level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_both_forms() {
        assert_eq!(parse_api_level("33", "--android-sdk-platform", 28).unwrap(), 33);
        assert_eq!(parse_api_level("android-30", "--android-sdk-platform", 28).unwrap(), 30);
    }

    #[test]
    fn test_rejects_low_levels() {
        let err = parse_api_level("23", "--android-native-api-level", MIN_NATIVE_API_LEVEL).unwrap_err();
        assert_eq!(err.kind(), lydroid_core::ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("--android-native-api-level"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_api_level("latest", "--android-sdk-platform", 28).is_err());
    }
}
