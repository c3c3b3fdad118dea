//! Разбор длительностей вида `H:MM:SS.fff` и `M:SS.fff`

/// Длительность в миллисекундах или `None` для пустого и некорректного текста.
///
/// Час может быть любой ширины и больше 23; минуты и секунды строго меньше 60.
/// Дробная часть дополняется нулями до трёх цифр и обрезается до трёх.
pub fn parse_duration(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() || text == "\\N" {
        return None;
    }

    let (clock, fraction) = match text.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (text, None),
    };

    let millis = match fraction {
        None => 0,
        Some(fraction) => {
            if fraction.is_empty() || !all_digits(fraction) {
                return None;
            }
            let mut digits: String = fraction.chars().take(3).collect();
            while digits.len() < 3 {
                digits.push('0');
            }
            digits.parse::<i64>().ok()?
        }
    };

    let parts: Vec<&str> = clock.split(':').collect();
    if parts.iter().any(|p| !all_digits(p)) {
        return None;
    }
    let (hours, minutes, seconds) = match parts.as_slice() {
        [m, s] => (0, m.parse::<i64>().ok()?, s.parse::<i64>().ok()?),
        [h, m, s] => (h.parse::<i64>().ok()?, m.parse::<i64>().ok()?, s.parse::<i64>().ok()?),
        _ => return None,
    };
    if minutes >= 60 || seconds >= 60 {
        return None;
    }

    Some((hours * 3600 + minutes * 60 + seconds) * 1000 + millis)
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
