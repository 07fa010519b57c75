use crate::detection::{ColorLabel, LabelColor};
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

/// Reads a `name,red,green,blue` label map. The line index is the class id.
pub fn load_labels(filepath: &Path) -> io::Result<Vec<ColorLabel>> {
    let file = File::open(filepath)?;
    parse_labels(io::BufReader::new(file))
}

pub fn parse_labels(reader: impl BufRead) -> io::Result<Vec<ColorLabel>> {
    let mut color_labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').collect();

        if parts.len() != 4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid line format: {}", line),
            ));
        }

        let label = parts[0].trim().to_string();
        let red = parse_channel(parts[1], "red")?;
        let green = parse_channel(parts[2], "green")?;
        let blue = parse_channel(parts[3], "blue")?;

        color_labels.push(ColorLabel {
            label,
            color: LabelColor { red, green, blue },
        });
    }

    Ok(color_labels)
}

fn parse_channel(value: &str, channel: &str) -> io::Result<u8> {
    value.trim().parse().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid {} value: {}", channel, value.trim()),
        )
    })
}
