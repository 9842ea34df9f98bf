//! Server-rendered HTML pages.
//!
//! Every value that did not originate in this module goes through
//! [`escape`] before it is written into markup.

use crate::constants::RATING_CHOICES;
use crate::locations::CatalogLocation;
use crate::model::{FeedbackCategory, FeedbackQuery, FeedbackSummary, FeedbackWithLocation};
use crate::wizard::{FeedbackDraft, QueuedMedia, Step};

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, -apple-system, "Segoe UI", sans-serif; background: #eef2ff; color: #111827; }
.container { max-width: 1100px; margin: 0 auto; padding: 32px 16px; }
.narrow { max-width: 460px; }
.card { background: #fff; border-radius: 16px; box-shadow: 0 10px 25px rgba(0,0,0,0.08); padding: 28px; margin-bottom: 24px; }
.center { text-align: center; }
.muted { color: #6b7280; }
.small { font-size: 0.85em; }
h1 { margin-top: 0; }
.grid { display: grid; gap: 20px; grid-template-columns: repeat(auto-fill, minmax(180px, 1fr)); }
.two-col { display: grid; gap: 24px; grid-template-columns: repeat(auto-fit, minmax(300px, 1fr)); }
.qr-card { background: #fff; border-radius: 10px; box-shadow: 0 2px 6px rgba(0,0,0,0.08); padding: 16px; text-align: center; }
.qr-card img { width: 140px; height: 140px; object-fit: contain; }
.button { display: inline-block; border: 0; border-radius: 8px; padding: 10px 20px; font-weight: 600; font-size: 1em; cursor: pointer; text-decoration: none; background: #2563eb; color: #fff; }
.button.secondary { background: #4b5563; }
.button.link { background: none; color: #2563eb; padding: 4px 8px; }
.button[disabled] { opacity: 0.5; cursor: not-allowed; }
.field { margin-bottom: 20px; }
.field > label, .field > .label { display: block; font-weight: 600; margin-bottom: 8px; }
.ratings { display: flex; gap: 8px; }
.ratings label { width: 44px; height: 44px; border: 2px solid #d1d5db; border-radius: 50%; display: flex; align-items: center; justify-content: center; font-weight: 600; cursor: pointer; }
.ratings input { display: none; }
.ratings input:checked + span { color: #2563eb; }
.ratings label.selected { background: #2563eb; border-color: #2563eb; color: #fff; }
textarea, input[type=text], input[type=tel], select { width: 100%; box-sizing: border-box; padding: 8px 10px; border: 1px solid #d1d5db; border-radius: 8px; font: inherit; }
.actions { display: flex; gap: 12px; justify-content: space-between; }
.error { background: #fef2f2; border: 1px solid #fecaca; color: #dc2626; border-radius: 8px; padding: 12px; margin-bottom: 16px; }
.notice { background: #fefce8; border: 1px solid #fde68a; color: #854d0e; border-radius: 8px; padding: 16px; }
.steps { color: #6b7280; font-size: 0.9em; margin-bottom: 16px; }
.queued { list-style: none; padding: 0; margin: 8px 0; }
.queued li { display: flex; justify-content: space-between; align-items: center; padding: 4px 0; }
.stats { display: grid; gap: 16px; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr)); margin-bottom: 24px; }
.stat { background: #fff; border-radius: 10px; padding: 20px; box-shadow: 0 1px 3px rgba(0,0,0,0.06); }
.stat .value { font-size: 1.8em; font-weight: 700; }
.filters { display: flex; gap: 12px; flex-wrap: wrap; }
.filters input[type=text] { flex: 1; min-width: 200px; width: auto; }
.filters select { width: auto; }
table { width: 100%; border-collapse: collapse; background: #fff; }
th { text-align: left; font-size: 0.75em; text-transform: uppercase; color: #6b7280; background: #f9fafb; padding: 10px 14px; }
td { padding: 12px 14px; border-top: 1px solid #e5e7eb; vertical-align: top; font-size: 0.9em; }
.badge { display: inline-block; padding: 2px 8px; border-radius: 999px; font-size: 0.8em; font-weight: 600; }
.badge.low { color: #dc2626; background: #fee2e2; }
.badge.mid { color: #ca8a04; background: #fef9c3; }
.badge.high { color: #16a34a; background: #dcfce7; }
.yes { color: #16a34a; }
.no { color: #dc2626; }
"#;

/// Escape text for use in HTML element content and quoted attribute values
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<style>{style}</style>
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape(title),
        style = STYLE,
        body = body
    )
}

pub fn landing_page(location_count: u32) -> String {
    let steps = [
        "Find a QR code posted near any toilet",
        "Scan the QR code with your phone camera",
        "Fill out the quick feedback form",
        "Submit your feedback instantly",
    ]
    .iter()
    .enumerate()
    .map(|(i, step)| format!("<li><strong>{}.</strong> {}</li>", i + 1, step))
    .collect::<String>();

    let features = [
        "Rate cleanliness (1-5)",
        "Report water availability",
        "Report soap availability",
        "Add optional comments, photos and videos",
        "Real-time data collection",
    ]
    .iter()
    .map(|feature| format!(r#"<li><span class="yes">✓</span> {}</li>"#, feature))
    .collect::<String>();

    let body = format!(
        r#"<div class="container">
<div class="center">
<h1>🚽 Toilet Feedback System</h1>
<p class="muted">Scan QR codes to provide feedback on toilet cleanliness, water availability and soap availability. Help us maintain clean and well-stocked facilities.</p>
</div>
<div class="two-col">
<div class="card"><h2>How It Works</h2><ul>{steps}</ul></div>
<div class="card"><h2>Features</h2><ul>{features}</ul></div>
</div>
<p class="center">
<a class="button" href="/admin">Admin Dashboard</a>
<a class="button secondary" href="/qr-codes">View QR Codes</a>
</p>
<div class="notice">
<strong>Provisioned locations</strong>
<p>{count} locations (toilet_1 to toilet_{count}) are provisioned. Each has its own QR code linking to a feedback form.</p>
</div>
</div>"#,
        steps = steps,
        features = features,
        count = location_count
    );
    layout("Toilet Feedback System", &body)
}

/// Grid of QR cards, one per location.
///
/// `image_prefix` is prepended to each image file name; `with_links` adds a
/// link to the location's form under every card.
pub fn gallery_html(locations: &[CatalogLocation], image_prefix: &str, with_links: bool) -> String {
    let mut html = String::from(r#"<div class="grid">"#);
    for location in locations {
        let link = if with_links {
            format!(
                r#"<a class="button link" href="/toilet/{id}">Test Form →</a>"#,
                id = escape(&location.id)
            )
        } else {
            String::new()
        };
        html.push_str(&format!(
            r#"
<div class="qr-card">
<h3>{label}</h3>
<img src="{prefix}{file}" alt="QR Code for {id}">
<p class="muted small">{description}</p>
{link}
</div>"#,
            label = escape(&location.label()),
            prefix = escape(image_prefix),
            file = escape(&location.image_file_name()),
            id = escape(&location.id),
            description = escape(&location.description()),
            link = link
        ));
    }
    html.push_str("\n</div>");
    html
}

pub fn qr_codes_page(locations: &[CatalogLocation], image_prefix: &str) -> String {
    let body = format!(
        r#"<div class="container">
<div class="center">
<h1>Toilet QR Codes</h1>
<p class="muted">All QR codes for the toilet feedback system. Each QR code links to a specific toilet's feedback form.</p>
</div>
{gallery}
<div class="card center" style="margin-top: 32px">
<h3>QR Code Generation</h3>
<p>To generate the QR code images, run:</p>
<code>toilet_feedback generate-qr</code>
<p class="muted small">This writes one PNG per location plus an index page into the configured output directory.</p>
</div>
</div>"#,
        gallery = gallery_html(locations, image_prefix, true)
    );
    layout("Toilet QR Codes", &body)
}

/// Standalone gallery written next to the generated images
pub fn provisioned_index_page(locations: &[CatalogLocation]) -> String {
    let body = format!(
        r#"<div class="container">
<h1 class="center">Toilet QR Codes</h1>
<p class="center muted">Scan any QR code to submit feedback for that specific toilet</p>
{gallery}
<p class="center" style="margin-top: 32px"><a class="button" href="/admin">View Admin Dashboard</a></p>
</div>"#,
        gallery = gallery_html(locations, "./", false)
    );
    layout("Toilet QR Codes - Admin View", &body)
}

fn yes_no(name: &str, label: &str, value: bool) -> String {
    format!(
        r#"<div class="field"><span class="label">{label}</span>
<label><input type="radio" name="{name}" value="yes"{yes}> Yes</label>
<label style="margin-left: 16px"><input type="radio" name="{name}" value="no"{no}> No</label>
</div>"#,
        label = label,
        name = name,
        yes = if value { " checked" } else { "" },
        no = if value { "" } else { " checked" }
    )
}

fn details_step(draft: &FeedbackDraft) -> String {
    let ratings = RATING_CHOICES
        .iter()
        .map(|&rating| {
            let selected = rating == draft.rating;
            format!(
                r#"<label{class}><input type="radio" name="rating" value="{rating}"{checked}><span>{rating}</span></label>"#,
                class = if selected { r#" class="selected""# } else { "" },
                rating = rating,
                checked = if selected { " checked" } else { "" }
            )
        })
        .collect::<String>();

    format!(
        r#"<div class="field"><span class="label">Cleanliness Rating (1-5)</span><div class="ratings">{ratings}</div></div>
{water}
{soap}
<div class="field"><label for="comments">Comments (Optional)</label>
<textarea id="comments" name="comments" rows="4" placeholder="Any additional comments about this toilet...">{comments}</textarea></div>
<div class="actions"><span></span><button class="button" type="submit" name="action" value="next">Next →</button></div>"#,
        ratings = ratings,
        water = yes_no("water_available", "Water Available", draft.water_available),
        soap = yes_no("soap_available", "Soap Available", draft.soap_available),
        comments = escape(&draft.comments)
    )
}

fn queued_list(kind: &str, media: &[QueuedMedia]) -> String {
    if media.is_empty() {
        return String::new();
    }
    let items = media
        .iter()
        .enumerate()
        .map(|(i, file)| {
            format!(
                r#"<li><span>{name}{done}</span><button class="button link" type="submit" name="action" value="remove-{kind}-{i}">Remove</button></li>"#,
                name = escape(&file.file_name),
                done = if file.uploaded_url.is_some() { " (uploaded)" } else { "" },
                kind = kind,
                i = i
            )
        })
        .collect::<String>();
    format!(r#"<ul class="queued">{}</ul>"#, items)
}

fn contact_step(draft: &FeedbackDraft) -> String {
    format!(
        r#"<div class="field"><label for="name">Name (Optional)</label>
<input type="text" id="name" name="name" value="{name}"></div>
<div class="field"><label for="mobile">Mobile (Optional)</label>
<input type="tel" id="mobile" name="mobile" value="{mobile}"></div>
<div class="field"><label for="extra_feedback">Additional Feedback (Optional)</label>
<textarea id="extra_feedback" name="extra_feedback" rows="3">{extra}</textarea></div>
<div class="field"><label for="photos">Photos</label>
<input type="file" id="photos" name="photos" accept="image/*" multiple>{photos}</div>
<div class="field"><label for="videos">Videos</label>
<input type="file" id="videos" name="videos" accept="video/*" multiple>{videos}</div>
<p><button class="button link" type="submit" name="action" value="attach">Add selected files</button></p>
<div class="actions">
<button class="button secondary" type="submit" name="action" value="back">← Back</button>
<button class="button" type="submit" name="action" value="submit">Submit Feedback</button>
</div>"#,
        name = escape(&draft.name),
        mobile = escape(&draft.mobile),
        extra = escape(&draft.extra_feedback),
        photos = queued_list("photo", &draft.photos),
        videos = queued_list("video", &draft.videos),
    )
}

/// The wizard at its current step
pub fn form_page(draft: &FeedbackDraft) -> String {
    let error = draft
        .error
        .as_deref()
        .map(|message| format!(r#"<div class="error">{}</div>"#, escape(message)))
        .unwrap_or_default();
    let fields = match draft.step {
        Step::Details => details_step(draft),
        Step::Contact => contact_step(draft),
    };

    let body = format!(
        r#"<div class="container narrow">
<div class="card">
<div class="center"><h1>Toilet Feedback</h1><p class="muted">{name}</p></div>
<div class="steps">Step {step} of 2</div>
{error}
<form method="post" action="/toilet/{id}" enctype="multipart/form-data">
<input type="hidden" name="draft_id" value="{draft_id}">
{fields}
</form>
</div>
</div>"#,
        name = escape(&draft.location.name),
        step = draft.step.number(),
        error = error,
        id = escape(&draft.location.id),
        draft_id = draft.id,
        fields = fields
    );
    layout("Toilet Feedback", &body)
}

/// Shown to a post that arrives while the same draft is being submitted
pub fn submitting_page(location_id: &str) -> String {
    let body = format!(
        r#"<div class="container narrow">
<div class="card center">
<h1>Toilet Feedback</h1>
<p class="muted">Your feedback for {id} is being submitted. Please wait.</p>
<button class="button" type="button" disabled>Submitting…</button>
</div>
</div>"#,
        id = escape(location_id)
    );
    layout("Submitting Feedback", &body)
}

pub fn thank_you_page(location_id: &str) -> String {
    let body = format!(
        r#"<div class="container narrow">
<div class="card center">
<h1 class="yes">✓</h1>
<h2>Thank You!</h2>
<p class="muted">Your feedback has been submitted successfully.</p>
<a class="button" href="/toilet/{id}">Submit Another Feedback</a>
</div>
</div>"#,
        id = escape(location_id)
    );
    layout("Thank You", &body)
}

pub fn not_found_page() -> String {
    layout(
        "Not Found",
        r#"<div class="container narrow">
<div class="card center">
<h1>404</h1>
<p class="muted">This page could not be found.</p>
<a class="button" href="/">Back to Home</a>
</div>
</div>"#,
    )
}

/// A data service failure outside the form and dashboard flows
pub fn service_error_page(message: &str) -> String {
    let body = format!(
        r#"<div class="container narrow">
<div class="card center">
<h1>Something went wrong</h1>
<div class="error">{message}</div>
<a class="button" href="/">Back to Home</a>
</div>
</div>"#,
        message = escape(message)
    );
    layout("Error", &body)
}

fn rating_class(rating: u8) -> &'static str {
    if rating <= 2 {
        "low"
    } else if rating <= 3 {
        "mid"
    } else {
        "high"
    }
}

fn status_icon(available: bool) -> &'static str {
    if available {
        r#"<span class="yes">✓</span>"#
    } else {
        r#"<span class="no">✗</span>"#
    }
}

fn media_links(photos: &[String], videos: &[String]) -> String {
    let links = photos
        .iter()
        .enumerate()
        .map(|(i, url)| ("Photo", i, url))
        .chain(videos.iter().enumerate().map(|(i, url)| ("Video", i, url)))
        .map(|(kind, i, url)| {
            format!(
                r#"<a href="{url}" target="_blank" rel="noopener">{kind} {n}</a>"#,
                url = escape(url),
                kind = kind,
                n = i + 1
            )
        })
        .collect::<Vec<_>>();
    if links.is_empty() {
        "-".to_string()
    } else {
        links.join("<br>")
    }
}

fn feedback_row(row: &FeedbackWithLocation) -> String {
    let feedback = &row.feedback;
    let description = row
        .location
        .as_ref()
        .map(|l| escape(&l.location))
        .unwrap_or_default();
    let extra = feedback
        .extra_feedback
        .as_deref()
        .map(|extra| format!(r#"<div class="muted small">{}</div>"#, escape(extra)))
        .unwrap_or_default();
    let contact = [feedback.name.as_deref(), feedback.mobile.as_deref()]
        .iter()
        .flatten()
        .map(|value| escape(value))
        .collect::<Vec<_>>();

    format!(
        r#"<tr>
<td><strong>{id}</strong><div class="muted">{description}</div></td>
<td><span class="badge {class}">{rating}/5</span></td>
<td>{water}</td>
<td>{soap}</td>
<td>{comments}{extra}</td>
<td>{contact}</td>
<td>{media}</td>
<td class="muted">{date}</td>
</tr>"#,
        id = escape(&feedback.location_id),
        description = description,
        class = rating_class(feedback.rating),
        rating = feedback.rating,
        water = status_icon(feedback.water_available),
        soap = status_icon(feedback.soap_available),
        comments = feedback
            .comments
            .as_deref()
            .map(escape)
            .unwrap_or_else(|| "-".to_string()),
        extra = extra,
        contact = if contact.is_empty() {
            "-".to_string()
        } else {
            contact.join("<br>")
        },
        media = media_links(&feedback.photos, &feedback.videos),
        date = feedback.created_at.format("%Y-%m-%d %H:%M UTC")
    )
}

/// What one dashboard request produced
pub enum DashboardData<'a> {
    Loaded {
        records: &'a [FeedbackWithLocation],
        summary: FeedbackSummary,
    },
    /// The fetch failed; nothing from earlier requests is shown
    Failed(&'a str),
}

pub fn dashboard_page(query: &FeedbackQuery, data: DashboardData<'_>) -> String {
    let search = query.search.as_deref().unwrap_or("");
    let options = FeedbackCategory::ALL
        .iter()
        .map(|category| {
            format!(
                r#"<option value="{value}"{selected}>{title}</option>"#,
                value = category.as_str(),
                selected = if *category == query.category { " selected" } else { "" },
                title = escape(category.title())
            )
        })
        .collect::<String>();
    let refresh_href = format!(
        "/admin?filter={}&q={}",
        query.category.as_str(),
        urlencoding::encode(search)
    );

    let (records, summary, error) = match data {
        DashboardData::Loaded { records, summary } => (records, Some(summary), None),
        DashboardData::Failed(message) => (&[][..], None, Some(message)),
    };

    let count = |value: Option<u64>| value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
    let stats = format!(
        r#"<div class="stats">
<div class="stat"><div class="value">{total}</div><div class="muted">Total Feedbacks</div></div>
<div class="stat"><div class="value no">{low}</div><div class="muted">Low Ratings</div></div>
<div class="stat"><div class="value" style="color:#ea580c">{water}</div><div class="muted">No Water</div></div>
<div class="stat"><div class="value" style="color:#ca8a04">{soap}</div><div class="muted">No Soap</div></div>
</div>"#,
        total = count(summary.map(|s| s.total)),
        low = count(summary.map(|s| s.low_rating)),
        water = count(summary.map(|s| s.no_water)),
        soap = count(summary.map(|s| s.no_soap))
    );

    let error_html = error
        .map(|message| format!(r#"<div class="error">{}</div>"#, escape(message)))
        .unwrap_or_default();

    let table = if records.is_empty() {
        r#"<p class="center muted" style="padding: 40px 0">No feedbacks found matching your criteria.</p>"#
            .to_string()
    } else {
        format!(
            r#"<div style="overflow-x:auto"><table>
<thead><tr><th>Toilet</th><th>Rating</th><th>Water</th><th>Soap</th><th>Comments</th><th>Contact</th><th>Media</th><th>Date</th></tr></thead>
<tbody>{rows}</tbody>
</table></div>"#,
            rows = records.iter().map(feedback_row).collect::<String>()
        )
    };

    let body = format!(
        r#"<div class="container">
<h1>Admin Dashboard</h1>
<p class="muted">Manage toilet feedback submissions</p>
<div class="card">
<form class="filters" method="get" action="/admin">
<input type="text" name="q" value="{search}" placeholder="Search by toilet ID or comments...">
<select name="filter">{options}</select>
<button class="button" type="submit">Apply</button>
<a class="button secondary" href="{refresh}">Refresh</a>
</form>
</div>
{stats}
<div class="card">
<h2>Feedback Submissions</h2>
{error}
{table}
</div>
</div>"#,
        search = escape(search),
        options = options,
        refresh = escape(&refresh_href),
        stats = stats,
        error = error_html,
        table = table
    );
    layout("Admin Dashboard", &body)
}
