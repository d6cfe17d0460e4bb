use askama::Template;

use crate::models::{Board, Post};

/// A subject/body pair ready to hand to the mail transport. Bodies are HTML
/// with all user-supplied text escaped by the template engine; subjects are
/// plain text.
#[derive(Debug)]
pub struct Rendered {
    pub subject: String,
    pub html: String,
}

const DESCRIPTION_PREVIEW_CHARS: usize = 200;

/// Char-boundary-safe truncation with a trailing ellipsis.
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}

pub fn post_url(app_url: &str, board: &Board, post: &Post) -> String {
    format!(
        "{}/{}?post={}",
        app_url.trim_end_matches('/'),
        urlencoding::encode(&board.slug),
        post.id
    )
}

#[derive(Template)]
#[template(path = "email/new_comment.html")]
struct NewCommentEmail<'a> {
    board_title: &'a str,
    app_url: &'a str,
    post_title: &'a str,
    post_url: &'a str,
    comment: &'a str,
    is_author: bool,
}

#[derive(Template)]
#[template(path = "email/status_change.html")]
struct StatusChangeEmail<'a> {
    board_title: &'a str,
    app_url: &'a str,
    post_title: &'a str,
    post_url: &'a str,
    status_label: &'a str,
}

#[derive(Template)]
#[template(path = "email/new_post.html")]
struct NewPostEmail<'a> {
    board_title: &'a str,
    app_url: &'a str,
    post_title: &'a str,
    post_url: &'a str,
    description: &'a str,
}

pub fn new_comment_email(
    app_url: &str,
    post: &Post,
    board: &Board,
    comment: &str,
    recipient_is_author: bool,
) -> askama::Result<Rendered> {
    let html = NewCommentEmail {
        board_title: &board.title,
        app_url,
        post_title: &post.title,
        post_url: &post_url(app_url, board, post),
        comment,
        is_author: recipient_is_author,
    }
    .render()?;
    Ok(Rendered { subject: format!("New comment on \"{}\"", post.title), html })
}

pub fn status_change_email(
    app_url: &str,
    post: &Post,
    board: &Board,
    new_status: &str,
) -> askama::Result<Rendered> {
    // "in_progress" reads as "in progress" everywhere user-facing
    let status_label = new_status.replace('_', " ");
    let html = StatusChangeEmail {
        board_title: &board.title,
        app_url,
        post_title: &post.title,
        post_url: &post_url(app_url, board, post),
        status_label: &status_label,
    }
    .render()?;
    Ok(Rendered {
        subject: format!("Status update: \"{}\" is now {}", post.title, status_label),
        html,
    })
}

pub fn new_post_email(app_url: &str, post: &Post, board: &Board) -> askama::Result<Rendered> {
    let html = NewPostEmail {
        board_title: &board.title,
        app_url,
        post_title: &post.title,
        post_url: &post_url(app_url, board, post),
        description: &truncate_chars(&post.description, DESCRIPTION_PREVIEW_CHARS),
    }
    .render()?;
    Ok(Rendered {
        subject: format!("New post on {}: \"{}\"", board.title, post.title),
        html,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_board() -> Board {
        Board {
            id: Uuid::new_v4(),
            slug: "acme feedback".into(),
            title: "Acme".into(),
            owner_id: Uuid::new_v4(),
        }
    }

    fn sample_post(title: &str, description: &str) -> Post {
        Post {
            id: Uuid::new_v4(),
            board_id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            title: title.into(),
            description: description.into(),
            status: "open".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn truncate_chars_boundaries() {
        let exact: String = "a".repeat(200);
        assert_eq!(truncate_chars(&exact, 200), exact);
        let long: String = "a".repeat(201);
        let cut = truncate_chars(&long, 200);
        assert_eq!(cut.chars().count(), 201); // 200 kept + ellipsis
        assert!(cut.ends_with('…'));
        // multi-byte input must not split a char
        let accents = "é".repeat(250);
        assert!(truncate_chars(&accents, 200).starts_with("ééé"));
    }

    #[test]
    fn comment_body_is_escaped() {
        let board = sample_board();
        let post = sample_post("Dark <mode>", "");
        let rendered =
            new_comment_email("https://telloo.app", &post, &board, "<script>alert(1)</script>", false)
                .unwrap();
        assert!(rendered.html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!rendered.html.contains("<script>"));
        assert!(rendered.html.contains("&lt;mode&gt;"));
    }

    #[test]
    fn comment_phrasing_differs_for_author() {
        let board = sample_board();
        let post = sample_post("Search", "");
        let to_author =
            new_comment_email("https://telloo.app", &post, &board, "nice", true).unwrap();
        let to_commenter =
            new_comment_email("https://telloo.app", &post, &board, "nice", false).unwrap();
        assert!(to_author.html.contains("your post"));
        assert!(to_commenter.html.contains("you've commented on"));
        assert_eq!(to_author.subject, to_commenter.subject);
    }

    #[test]
    fn status_label_is_humanized_and_uppercased_in_body() {
        let board = sample_board();
        let post = sample_post("Exports", "");
        let rendered =
            status_change_email("https://telloo.app", &post, &board, "in_progress").unwrap();
        assert_eq!(rendered.subject, "Status update: \"Exports\" is now in progress");
        assert!(rendered.html.contains("IN PROGRESS"));
    }

    #[test]
    fn new_post_truncates_long_descriptions() {
        let board = sample_board();
        let post = sample_post("Idea", &"x".repeat(300));
        let rendered = new_post_email("https://telloo.app", &post, &board).unwrap();
        assert!(rendered.html.contains(&format!("{}…", "x".repeat(200))));
        assert!(!rendered.html.contains(&"x".repeat(201)));
    }

    #[test]
    fn post_url_encodes_slug() {
        let board = sample_board();
        let post = sample_post("Idea", "");
        let url = post_url("https://telloo.app/", &board, &post);
        assert_eq!(url, format!("https://telloo.app/acme%20feedback?post={}", post.id));
    }
}
