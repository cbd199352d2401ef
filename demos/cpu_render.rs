//! Headless CPU demo: stirs two dye colors along a circle, steps the
//! scalar solver, and writes the rasterized result to a PNG.

use fluxel::CpuFluid;

fn main() {
    let n = 100;
    let mut fluid = CpuFluid::new(n, &[[90, 180, 255], [255, 120, 60]]);

    for frame in 0..120usize {
        let angle = frame as f32 * 0.12;
        let i = (51.0 + 30.0 * angle.cos()) as usize;
        let j = (51.0 + 30.0 * angle.sin()) as usize;
        fluid.inject(i, j, frame % 2);
        fluid.step();
    }

    let side = fluid.image_size() as u32;
    let mut pixels = vec![0u8; (side * side * 4) as usize];
    fluid.rasterize(&mut pixels);

    let image = image::RgbaImage::from_raw(side, side, pixels).expect("buffer sized to the image");
    image.save("cpu_render.png").expect("failed to write cpu_render.png");
    println!("wrote cpu_render.png ({0}x{0})", side);
}
