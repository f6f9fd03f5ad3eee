use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wirenet::http::headercollection::HeaderCollection;

const RESPONSE_HEADERS: &str = "Date: Mon, 27 Jul 2009 12:28:53 GMT\r\n\
Server: Apache/2.2.14 (Win32)\r\n\
Last-Modified: Wed, 22 Jul 2009 19:15:56 GMT\r\n\
Content-Type: text/html; charset=utf-8\r\n\
Cache-Control: no-cache\r\n\
cache-control: no-store\r\n\
Set-Cookie: WMF-Last-Access=xxxxxxxxxxx; Path=/; HttpOnly\r\n\
Set-Cookie: GeoIP=xxxxxxxxxxxxxxxxxxxxxxxxxxx; Path=/\r\n\
WWW-Authenticate: Basic realm=\"files\"\r\n\
WWW-Authenticate: Digest realm=\"files\", nonce=\"dcd98b7102dd2f0e8b11d0f600bfb0c093\", qop=\"auth\"\r\n\
X-Long: first\r\n  second\r\n\
Transfer-Encoding: chunked\r\n";

fn benchmark_parse_block(c: &mut Criterion) {
    c.bench_function("headers_parse_block", |b| {
        b.iter(|| HeaderCollection::parse_block(black_box(RESPONSE_HEADERS)))
    });
}

fn benchmark_headers_set(c: &mut Criterion) {
    c.bench_function("headers_set", |b| {
        b.iter(|| {
            let mut headers = HeaderCollection::new();
            headers.set("Host", "example.com", true).unwrap();
            headers.set("User-Agent", "wirenet/0.1", true).unwrap();
            headers.set("Accept", "text/html", false).unwrap();
            headers.set("Accept", "application/json", false).unwrap();
            headers.set("Connection", "keep-alive", true).unwrap();
            black_box(headers)
        })
    });
}

fn benchmark_write_to(c: &mut Criterion) {
    let headers = HeaderCollection::parse_block(RESPONSE_HEADERS).unwrap();
    c.bench_function("headers_write_to", |b| {
        b.iter(|| {
            let mut out = String::with_capacity(1024);
            black_box(&headers).write_to(&mut out);
            out
        })
    });
}

criterion_group!(
    benches,
    benchmark_parse_block,
    benchmark_headers_set,
    benchmark_write_to
);
criterion_main!(benches);
