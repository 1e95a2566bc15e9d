//! Static landing page rendered from a campaign's metadata record.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::DateTime;
use studio_contracts::runs::CampaignMetadata;

pub const LANDING_FILE_NAME: &str = "index.html";

/// Pure function of the record; no remote calls. Blocks for video, audio
/// and palette appear only when the record has them.
pub fn render_landing_page(metadata: &CampaignMetadata) -> String {
    let result = &metadata.result;
    let title = escape_html(metadata.title());
    let mode_config = metadata.mode_config.as_ref();

    let mode_label = mode_config
        .map(|mode| mode.name.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(&result.mode);
    let mut badges = vec![format!("<span class='badge'>{}</span>", escape_html(mode_label))];
    if !result.studio_inspiration.is_empty() {
        badges.push(format!(
            "<span class='badge'>inspired by {}</span>",
            escape_html(&result.studio_inspiration)
        ));
    }
    if let Some(quality) = metadata.quality.as_deref().filter(|q| !q.is_empty()) {
        badges.push(format!(
            "<span class='badge'>{} quality</span>",
            escape_html(quality)
        ));
    }
    badges.push(format!(
        "<span class='badge'>{}</span>",
        escape_html(&format_timestamp(result.timestamp))
    ));

    let palette = mode_config
        .map(|mode| mode.color_palette.as_slice())
        .unwrap_or_default();
    let palette_html = if palette.is_empty() {
        String::new()
    } else {
        let swatches: String = palette
            .iter()
            .map(|color| {
                let color = escape_html(color);
                format!("<span class='swatch' style='background:{color}' title='{color}'></span>")
            })
            .collect();
        format!("<div class='palette'>{swatches}</div>")
    };

    let hero_background = result
        .first_image()
        .map(|image| {
            format!(
                "<div class='hero-bg' data-parallax style=\"background-image:url('{}')\"></div>",
                escape_html(&image.url)
            )
        })
        .unwrap_or_default();

    let description = if result.description.is_empty() {
        mode_config
            .map(|mode| mode.description.clone())
            .unwrap_or_default()
    } else {
        result.description.clone()
    };

    let video_html = match result.video.as_deref() {
        Some(url) => format!(
            "<section class='video'><video src='{}' autoplay muted loop playsinline controls></video></section>",
            escape_html(url)
        ),
        None => String::new(),
    };
    let audio_html = match result.audio.as_deref() {
        Some(url) => format!(
            "<section class='audio'><h2>Soundtrack</h2><audio src='{}' controls></audio></section>",
            escape_html(url)
        ),
        None => String::new(),
    };

    let gallery: String = result
        .images
        .iter()
        .map(|image| {
            format!(
                "<figure class='card'><img data-src='{url}' alt='{job}'><figcaption><div class='job'>{job}</div><div class='prompt'>{prompt}</div></figcaption></figure>",
                url = escape_html(&image.url),
                job = escape_html(image.job.as_str()),
                prompt = escape_html(&image.prompt),
            )
        })
        .collect();
    let gallery_html = if gallery.is_empty() {
        String::new()
    } else {
        format!("<section class='gallery'>{gallery}</section>")
    };

    let mut details = vec![
        detail_row("Product", &result.product),
        detail_row("Mode", &result.mode),
    ];
    if let Some(mode) = mode_config {
        if !mode.motion_style.is_empty() {
            details.push(detail_row("Motion", &mode.motion_style));
        }
        if !mode.audio_character.is_empty() {
            details.push(detail_row("Audio", &mode.audio_character));
        }
    }
    details.push(detail_row(
        "Assets",
        &format!(
            "{} images, {} video, {} audio",
            result.images.len(),
            u8::from(result.video.is_some()),
            u8::from(result.audio.is_some())
        ),
    ));
    for failure in &result.failures {
        details.push(detail_row(
            &format!("{} failed", failure.job),
            &failure.error,
        ));
    }
    if let Some(reason) = metadata.fallback_reason.as_deref() {
        details.push(detail_row("Fallback", reason));
    }
    let details_html = details.concat();
    let badges_html = badges.concat();
    let description = escape_html(&description);

    format!(
        "<!doctype html>\n<html lang='en'>\n<head>\n  <meta charset='utf-8'>\n  <meta name='viewport' content='width=device-width, initial-scale=1'>\n  <title>{title}</title>\n  <style>\n    body {{ margin: 0; font-family: 'Helvetica Neue', Arial, sans-serif; background: #0d0d12; color: #f2f2f5; }}\n    .hero {{ position: relative; min-height: 70vh; display: flex; flex-direction: column; justify-content: flex-end; padding: 48px; overflow: hidden; }}\n    .hero-bg {{ position: absolute; inset: -10%; background-size: cover; background-position: center; opacity: 0.45; will-change: transform; }}\n    .hero h1, .hero p, .badges, .palette {{ position: relative; }}\n    .hero h1 {{ font-size: 64px; margin: 0 0 12px; letter-spacing: -1px; }}\n    .badge {{ display: inline-block; margin: 0 8px 8px 0; padding: 4px 10px; border: 1px solid rgba(255,255,255,0.3); border-radius: 999px; font-size: 12px; text-transform: uppercase; }}\n    .palette {{ display: flex; gap: 6px; margin-top: 12px; }}\n    .swatch {{ width: 28px; height: 28px; border-radius: 50%; border: 1px solid rgba(255,255,255,0.2); }}\n    section {{ padding: 32px 48px; }}\n    video {{ width: 100%; border-radius: 12px; }}\n    .gallery {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(280px, 1fr)); gap: 20px; }}\n    .card {{ margin: 0; background: #17171f; border-radius: 12px; overflow: hidden; }}\n    .card img {{ width: 100%; display: block; opacity: 0; transition: opacity 0.6s; }}\n    .card img.loaded {{ opacity: 1; }}\n    figcaption {{ padding: 12px; font-size: 13px; }}\n    .job {{ font-weight: bold; text-transform: uppercase; font-size: 11px; color: #9999ff; }}\n    .details dl {{ display: grid; grid-template-columns: max-content 1fr; gap: 8px 24px; }}\n    .details dt {{ color: #9a9aae; }}\n    .details dd {{ margin: 0; }}\n  </style>\n</head>\n<body>\n  <header class='hero'>\n    {hero_background}\n    <h1>{title}</h1>\n    <p>{description}</p>\n    <div class='badges'>{badges_html}</div>\n    {palette_html}\n  </header>\n  {video_html}\n  {gallery_html}\n  {audio_html}\n  <section class='details'><h2>Campaign details</h2><dl>{details_html}</dl></section>\n  <script>\n    (function () {{\n      var images = document.querySelectorAll('img[data-src]');\n      function reveal(img) {{ img.src = img.getAttribute('data-src'); img.onload = function () {{ img.classList.add('loaded'); }}; }}\n      if ('IntersectionObserver' in window) {{\n        var observer = new IntersectionObserver(function (entries) {{\n          entries.forEach(function (entry) {{ if (entry.isIntersecting) {{ reveal(entry.target); observer.unobserve(entry.target); }} }});\n        }}, {{ rootMargin: '200px' }});\n        images.forEach(function (img) {{ observer.observe(img); }});\n      }} else {{\n        images.forEach(reveal);\n      }}\n      var layer = document.querySelector('[data-parallax]');\n      if (layer) {{\n        window.addEventListener('scroll', function () {{ layer.style.transform = 'translateY(' + (window.scrollY * 0.3) + 'px)'; }}, {{ passive: true }});\n      }}\n    }})();\n  </script>\n</body>\n</html>\n"
    )
}

pub fn write_landing_page(metadata: &CampaignMetadata, out_path: &Path) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(out_path, render_landing_page(metadata))
        .with_context(|| format!("failed to write landing page {}", out_path.display()))?;
    Ok(())
}

fn detail_row(label: &str, value: &str) -> String {
    format!(
        "<dt>{}</dt><dd>{}</dd>",
        escape_html(label),
        escape_html(value)
    )
}

fn format_timestamp(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}
