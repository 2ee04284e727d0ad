use crate::application::ports::StoredUpload;
use crate::config::APP_NAME;
use crate::domain::detection::DetectionResponse;

const STYLE: &str = "body{font-family:sans-serif;max-width:960px;margin:2rem auto;padding:0 1rem}\
table{border-collapse:collapse;width:100%}td,th{border:1px solid #ccc;padding:.3rem .5rem;text-align:left}\
img{max-width:100%;margin:1rem 0}.error{color:#b00020}";

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title} - {app}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <h1>{app}</h1>\n{body}\n</body>\n</html>\n",
        title = escape(title),
        app = escape(APP_NAME),
    )
}

fn upload_form() -> &'static str {
    "<form action=\"/predict\" method=\"post\" enctype=\"multipart/form-data\">\n\
     <input type=\"file\" name=\"file\" accept=\"image/*\" required>\n\
     <button type=\"submit\">Detect</button>\n</form>"
}

pub fn index() -> String {
    layout("Upload", &format!("<p>Upload an image to detect objects.</p>\n{}", upload_form()))
}

pub fn results(upload: &StoredUpload, response: &DetectionResponse) -> String {
    let mut body = String::new();
    body.push_str(&format!(
        "<img src=\"{src}\" alt=\"{alt}\">\n",
        src = escape(&upload.public_path),
        alt = escape(&upload.file_name)
    ));
    body.push_str(&format!(
        "<p>{} object(s) found in {:.1} ms.</p>\n",
        response.detections.len(),
        response.processing_time * 1000.0
    ));

    if !response.detections.is_empty() {
        body.push_str("<table>\n<tr><th>#</th><th>Class</th><th>Confidence</th><th>Box (x1, y1, x2, y2)</th></tr>\n");
        for (i, det) in response.detections.iter().enumerate() {
            let b = det.bbox;
            body.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{:.2}</td><td>{:.0}, {:.0}, {:.0}, {:.0}</td></tr>\n",
                i + 1,
                escape(&det.class_name),
                det.confidence,
                b.x1,
                b.y1,
                b.x2,
                b.y2
            ));
        }
        body.push_str("</table>\n");
    }

    body.push_str("<h2>Try another image</h2>\n");
    body.push_str(upload_form());
    layout("Results", &body)
}

pub fn error(message: &str) -> String {
    layout(
        "Error",
        &format!("<p class=\"error\">{}</p>\n{}", escape(message), upload_form()),
    )
}

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
