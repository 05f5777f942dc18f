//! PNG output for frames and debug images.

use std::{
    fs::{self, File},
    io::{self, BufWriter},
    path::Path,
};

use dotmatrix_core::{
    debug_view::{BACKGROUND_SIZE, DebugBuffers, SHEET_HEIGHT, SHEET_WIDTH},
    ppu::{SCREEN_HEIGHT, SCREEN_WIDTH},
};
use log::info;

pub fn write_png_rgb(path: &Path, width: u32, height: u32, rgb: &[u8]) -> io::Result<()> {
    if rgb.len() != (width * height * 3) as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} bytes is not a {width}x{height} RGB image", rgb.len()),
        ));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let w = BufWriter::new(File::create(path)?);
    let mut encoder = png::Encoder::new(w, width, height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(io::Error::other)?;
    writer.write_image_data(rgb).map_err(io::Error::other)?;
    writer.finish().map_err(io::Error::other)
}

pub fn write_frame(path: &Path, frame: &[u8]) -> io::Result<()> {
    write_png_rgb(path, SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32, frame)?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// One PNG per debug image: `background.png`, `window.png`, `sprites.png`
/// and `tiles_0.png` .. `tiles_2.png`.
pub fn dump_debug_buffers(dir: &Path, buffers: &DebugBuffers) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let (w, h) = (SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32);
    let bg = BACKGROUND_SIZE as u32;

    write_png_rgb(&dir.join("background.png"), bg, bg, &buffers.background)?;
    write_png_rgb(&dir.join("window.png"), w, h, &buffers.window)?;
    write_png_rgb(&dir.join("sprites.png"), w, h, &buffers.sprites)?;
    for (i, sheet) in buffers.tile_sheets.iter().enumerate() {
        write_png_rgb(
            &dir.join(format!("tiles_{i}.png")),
            SHEET_WIDTH as u32,
            SHEET_HEIGHT as u32,
            sheet,
        )?;
    }
    info!("Wrote debug images to {}", dir.display());
    Ok(())
}
